#![deny(missing_docs)]

//! # Overview
//!
//! Process-lifecycle helpers used only by the supervisor (C7): writing and
//! reading its own PID file, spawning and watching the orchestrator child
//! process, checking liveness, and sending graceful-then-forceful termination
//! signals.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use errors::{MigrationError, INIT_002, SYSTEM_001};

/// A PID file written by the supervisor so `stop`/`status` subcommands can
/// find the running instance.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Writes the current process's PID to `path`, truncating any existing file.
    pub fn write(path: &Path) -> Result<Self, MigrationError> {
        let pid = std::process::id();
        fs::write(path, pid.to_string()).map_err(|e| {
            MigrationError::new(INIT_002, format!("failed to write PID file {}", path.display()))
                .with_cause(&e)
        })?;
        Ok(Self { path: path.to_path_buf() })
    }

    /// Reads a PID previously written by [`PidFile::write`], if the file exists.
    pub fn read(path: &Path) -> Result<Option<u32>, MigrationError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(contents.trim().parse().ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MigrationError::new(
                SYSTEM_001,
                format!("failed to read PID file {}", path.display()),
            )
            .with_cause(&e)),
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Spawns the orchestrator binary at `program` with `args`, inheriting stdio.
pub fn spawn_child(program: &Path, args: &[String]) -> Result<Child, MigrationError> {
    Command::new(program)
        .args(args)
        .spawn()
        .map_err(|e| {
            MigrationError::new(SYSTEM_001, format!("failed to spawn {}", program.display())).with_cause(&e)
        })
}

/// Whether a process with the given PID currently exists, checked via
/// `kill(pid, 0)` on Unix (sends no signal, only validates existence/permission).
#[cfg(unix)]
#[must_use]
pub fn process_is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Sends SIGTERM to `pid`.
#[cfg(unix)]
pub fn terminate(pid: u32) -> Result<(), MigrationError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| {
        MigrationError::new(SYSTEM_001, format!("failed to send SIGTERM to pid {pid}"))
            .with_cause(&std::io::Error::from_raw_os_error(e as i32))
    })
}

/// Sends SIGKILL to `pid`.
#[cfg(unix)]
pub fn kill_now(pid: u32) -> Result<(), MigrationError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGKILL).map_err(|e| {
        MigrationError::new(SYSTEM_001, format!("failed to send SIGKILL to pid {pid}"))
            .with_cause(&std::io::Error::from_raw_os_error(e as i32))
    })
}

/// Sends SIGTERM to `child`, then polls for exit up to `timeout`, sending
/// SIGKILL if it has not exited by then.
pub fn graceful_terminate(child: &mut Child, timeout: Duration) -> Result<(), MigrationError> {
    #[cfg(unix)]
    terminate(child.id())?;
    #[cfg(not(unix))]
    let _ = child.kill();

    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Registers SIGTERM and SIGINT handlers that set a shared flag, for
/// cooperative shutdown in a process with its own run loop (the supervisor).
#[cfg(unix)]
pub fn install_termination_flag() -> Result<Arc<AtomicBool>, MigrationError> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))
        .map_err(|e| MigrationError::new(SYSTEM_001, "failed to register SIGTERM handler").with_cause(&e))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag))
        .map_err(|e| MigrationError::new(SYSTEM_001, "failed to register SIGINT handler").with_cause(&e))?;
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pid_file_round_trips_and_removes_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("supervisor.pid");
        {
            let _pid_file = PidFile::write(&path).unwrap();
            let read = PidFile::read(&path).unwrap();
            assert_eq!(read, Some(std::process::id()));
        }
        assert!(!path.exists());
    }

    #[test]
    fn reading_a_missing_pid_file_returns_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.pid");
        assert_eq!(PidFile::read(&path).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn current_process_is_reported_alive() {
        assert!(process_is_alive(std::process::id()));
    }
}
