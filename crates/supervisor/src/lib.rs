#![deny(missing_docs)]

//! Out-of-process watchdog (C7): spawns the orchestrator, watches the
//! journal's supervisor projection for heartbeat loss, and restarts the
//! child with bounded backoff and a cooldown period. Never touches the
//! journal's advisory lock; every read is a single best-effort attempt.

use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::{Duration, Instant};

use errors::{MigrationError, SYSTEM_001};
use journal::{GlobalStatus, SupervisorProjection};

/// Grace window after spawning before heartbeat loss is enforced.
pub const GRACE_WINDOW: Duration = Duration::from_secs(120);
/// Interval between watch-loop checks.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// Heartbeat age past which the child is considered stuck.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(120);
/// How long a run must be stable before `restart_count` resets.
pub const STABILITY_RESET_AFTER: Duration = Duration::from_secs(600);
/// How long to wait out a cooldown after exhausting restart attempts.
pub const FAILURE_COOLDOWN: Duration = Duration::from_secs(1800);
/// Restart attempts allowed before entering cooldown.
pub const MAX_RESTARTS: u32 = 5;
/// Quiet period between stopping the old child and starting the new one.
pub const RESTART_QUIET_PERIOD: Duration = Duration::from_secs(2);
/// Grace period given to the child on a graceful-termination request.
pub const KILL_TIMEOUT: Duration = Duration::from_secs(15);

/// The watch-loop state, mirroring the states named in the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Child just spawned; heartbeat age is not yet enforced.
    Starting,
    /// Steady-state polling of the projection and child liveness.
    Watching,
    /// Heartbeat lost or child gone; deciding whether to restart.
    RestartPending,
    /// Restart budget exhausted; waiting out [`FAILURE_COOLDOWN`].
    Cooldown,
}

/// Everything the supervisor needs to spawn and re-spawn the orchestrator.
pub struct SupervisorConfig {
    /// Path to the orchestrator binary.
    pub orchestrator_path: PathBuf,
    /// Arguments forwarded to the orchestrator on every spawn.
    pub orchestrator_args: Vec<String>,
    /// Path to the supervisor-only projection file the orchestrator writes.
    pub projection_path: PathBuf,
    /// Path the supervisor's own PID file is written to.
    pub pid_path: PathBuf,
}

/// Outcome of one full watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The journal reported terminal success.
    Success,
    /// Restart budget was exhausted at least once, but the run ultimately
    /// reached a terminal status (success or failure) being reported now.
    CompletedAfterRestarts,
    /// Terminated by signal before a terminal status was observed.
    SignalledStop,
}

/// Drives the start/watch/restart/cooldown loop for one supervised run.
pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    child: Option<Child>,
    restart_count: u32,
    run_started_at: Instant,
    last_restart_at: Option<Instant>,
    had_cooldown: bool,
}

impl Supervisor {
    /// Builds a supervisor in the [`SupervisorState::Starting`] state,
    /// without spawning anything yet.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: SupervisorState::Starting,
            child: None,
            restart_count: 0,
            run_started_at: Instant::now(),
            last_restart_at: None,
            had_cooldown: false,
        }
    }

    /// Current watch-loop state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Restarts performed so far in this watch session.
    #[must_use]
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    fn spawn(&mut self) -> Result<(), MigrationError> {
        let child = platform::spawn_child(&self.config.orchestrator_path, &self.config.orchestrator_args)?;
        self.child = Some(child);
        self.run_started_at = Instant::now();
        Ok(())
    }

    fn child_exit_code(&mut self) -> Option<i32> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            _ => None,
        }
    }

    #[cfg(unix)]
    fn child_is_alive(&self) -> bool {
        self.child.as_ref().is_some_and(|c| platform::process_is_alive(c.id()))
    }

    #[cfg(not(unix))]
    fn child_is_alive(&self) -> bool {
        self.child.is_some()
    }

    /// Runs the full watch loop until a terminal outcome or `should_stop`
    /// reports a pending signal. `sleep` and `now` are injected so tests can
    /// drive the loop without real waiting.
    pub fn watch(
        &mut self,
        mut should_stop: impl FnMut() -> bool,
        mut sleep: impl FnMut(Duration),
    ) -> Result<WatchOutcome, MigrationError> {
        self.spawn()?;
        self.state = SupervisorState::Starting;

        loop {
            if should_stop() {
                if let Some(child) = self.child.as_mut() {
                    platform::graceful_terminate(child, KILL_TIMEOUT)?;
                }
                return Ok(WatchOutcome::SignalledStop);
            }

            sleep(CHECK_INTERVAL);

            let projection = read_projection(&self.config.projection_path);

            if let Some(p) = &projection {
                if is_terminal_success(p.status) {
                    return Ok(self.terminal_outcome());
                }
            }

            if let Some(code) = self.child_exit_code() {
                let success = code == 0 && projection.as_ref().is_some_and(|p| is_terminal_success(p.status));
                if success {
                    return Ok(self.terminal_outcome());
                }
                tracing::warn!(exit_code = code, "orchestrator exited without reaching terminal success");
                self.state = SupervisorState::RestartPending;
            } else if self.state != SupervisorState::Starting {
                let heartbeat_stale = projection.as_ref().is_none_or(|p| heartbeat_age(p) > HEARTBEAT_TIMEOUT);
                if heartbeat_stale || !self.child_is_alive() {
                    tracing::warn!("heartbeat stale or orchestrator process gone; restarting");
                    self.state = SupervisorState::RestartPending;
                } else if self.restart_count > 0 && self.run_started_at.elapsed() >= STABILITY_RESET_AFTER {
                    tracing::info!(restarts = self.restart_count, "run stable; resetting restart budget");
                    self.restart_count = 0;
                    self.state = SupervisorState::Watching;
                } else {
                    self.state = SupervisorState::Watching;
                }
            }

            if self.run_started_at.elapsed() >= GRACE_WINDOW {
                self.state = match self.state {
                    SupervisorState::Starting => SupervisorState::Watching,
                    other => other,
                };
            }

            if self.state == SupervisorState::RestartPending {
                let quiet_elapsed = self.last_restart_at.is_none_or(|t| t.elapsed() >= RESTART_QUIET_PERIOD);
                if self.restart_count < MAX_RESTARTS && quiet_elapsed {
                    if let Some(child) = self.child.as_mut() {
                        let _ = platform::graceful_terminate(child, KILL_TIMEOUT);
                    }
                    sleep(RESTART_QUIET_PERIOD);
                    self.spawn()?;
                    self.restart_count += 1;
                    self.last_restart_at = Some(Instant::now());
                    self.state = SupervisorState::Starting;
                } else {
                    self.state = SupervisorState::Cooldown;
                }
            }

            if self.state == SupervisorState::Cooldown {
                if let Some(child) = self.child.as_mut() {
                    let _ = platform::graceful_terminate(child, KILL_TIMEOUT);
                }
                tracing::warn!(seconds = FAILURE_COOLDOWN.as_secs(), "restart budget exhausted, entering cooldown");
                sleep(FAILURE_COOLDOWN);
                self.had_cooldown = true;
                self.restart_count = 0;
                self.last_restart_at = None;
                self.spawn()?;
                self.state = SupervisorState::Starting;
            }
        }
    }

    fn terminal_outcome(&self) -> WatchOutcome {
        if self.had_cooldown || self.restart_count > 0 {
            WatchOutcome::CompletedAfterRestarts
        } else {
            WatchOutcome::Success
        }
    }
}

fn is_terminal_success(status: GlobalStatus) -> bool {
    matches!(status, GlobalStatus::Success)
}

fn heartbeat_age(projection: &SupervisorProjection) -> Duration {
    let age = chrono::Utc::now().signed_duration_since(projection.last_heartbeat);
    age.to_std().unwrap_or(Duration::ZERO)
}

/// Reads the supervisor projection with a single best-effort attempt; never
/// retries and never takes the journal's advisory lock.
#[must_use]
pub fn read_projection(path: &Path) -> Option<SupervisorProjection> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

/// `check-migration`: exit 0 if the journal shows terminal success.
pub fn check_migration(projection_path: &Path) -> bool {
    read_projection(projection_path).is_some_and(|p| is_terminal_success(p.status))
}

/// `status`: renders the current projection as pretty JSON, or a `{"status":
/// "unknown"}` placeholder if it cannot be read.
pub fn status_json(projection_path: &Path) -> Result<String, MigrationError> {
    match read_projection(projection_path) {
        Some(p) => serde_json::to_string_pretty(&p)
            .map_err(|e| MigrationError::new(SYSTEM_001, "failed to serialize supervisor status").with_cause(&e)),
        None => Ok(r#"{"status":"unknown"}"#.to_string()),
    }
}

/// `stop`: reads the supervisor's own PID file and sends it SIGTERM.
pub fn stop(pid_path: &Path) -> Result<bool, MigrationError> {
    let Some(pid) = platform::PidFile::read(pid_path)? else {
        return Ok(false);
    };
    if !platform::process_is_alive(pid) {
        return Ok(false);
    }
    platform::terminate(pid)?;
    Ok(true)
}
