//! Production [`core::Mounter`] implementations: CIFS network shares and
//! already-attached USB volumes, both driven through the system `mount`/
//! `umount` binaries, grounded in the original tool's DFS connector.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use core::Mounter;
use errors::{MigrationError, MOUNT_001, MOUNT_002, MOUNT_003};

fn run(program: &str, args: &[&str], code: errors::ErrorCode) -> Result<(), MigrationError> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        MigrationError::new(code, format!("failed to spawn {program}")).with_cause(&e)
    })?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(MigrationError::new(code, format!("{program} exited with {}: {stderr}", output.status)))
}

fn is_mounted(mount_point: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string("/proc/mounts") else {
        return mount_point.exists() && mount_point.read_dir().is_ok_and(|mut d| d.next().is_some());
    };
    let target = mount_point.to_string_lossy();
    contents.lines().any(|line| line.split_whitespace().nth(1) == Some(target.as_ref()))
}

/// Writes (and, on drop, best-effort shreds) a `mount.cifs` credentials file.
struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    fn write(path: PathBuf, username: &str, password: &str) -> Result<Self, MigrationError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MigrationError::new(MOUNT_001, format!("failed to create directory for {}", path.display())).with_cause(&e)
            })?;
        }
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| MigrationError::new(MOUNT_001, format!("failed to create credentials file {}", path.display())).with_cause(&e))?;
        writeln!(file, "username={username}").and_then(|()| writeln!(file, "password={password}")).map_err(|e| {
            MigrationError::new(MOUNT_001, format!("failed to write credentials file {}", path.display())).with_cause(&e)
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
                MigrationError::new(MOUNT_001, format!("failed to restrict permissions on {}", path.display())).with_cause(&e)
            })?;
        }
        Ok(Self { path })
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        if let Ok(len) = std::fs::metadata(&self.path).map(|m| m.len()) {
            if let Ok(mut file) = std::fs::OpenOptions::new().write(true).open(&self.path) {
                let zeros = vec![0u8; len as usize];
                let _ = file.write_all(&zeros);
                let _ = file.sync_all();
            }
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Mounts a CIFS/DFS network share with `mount -t cifs`, writing a
/// credentials file that is shredded on drop.
pub struct CifsMounter {
    /// UNC-style source path, e.g. `//fileserver/home$`.
    pub source: String,
    /// Local mount point.
    pub mount_point: PathBuf,
    /// Mount credential username.
    pub username: String,
    /// Mount credential password, already decrypted.
    pub password: String,
    /// Where the transient credentials file is written.
    pub credentials_path: PathBuf,
}

impl Mounter for CifsMounter {
    fn mount(&self) -> Result<PathBuf, MigrationError> {
        if is_mounted(&self.mount_point) {
            return Ok(self.mount_point.clone());
        }
        std::fs::create_dir_all(&self.mount_point).map_err(|e| {
            MigrationError::new(MOUNT_001, format!("failed to create mount point {}", self.mount_point.display())).with_cause(&e)
        })?;

        let credentials = CredentialFile::write(self.credentials_path.clone(), &self.username, &self.password)?;
        let options = format!(
            "credentials={},iocharset=utf8,file_mode=0700,dir_mode=0700",
            credentials.path.display()
        );
        run(
            "mount",
            &["-t", "cifs", "-o", &options, &self.source, &self.mount_point.to_string_lossy()],
            MOUNT_001,
        )?;

        if !is_mounted(&self.mount_point) {
            return Err(MigrationError::new(MOUNT_001, "mount command succeeded but the share is not mounted"));
        }
        Ok(self.mount_point.clone())
    }

    fn unmount(&self) -> Result<(), MigrationError> {
        if !is_mounted(&self.mount_point) {
            return Ok(());
        }
        run("umount", &[&self.mount_point.to_string_lossy()], MOUNT_003)
    }
}

/// Mounts a USB block device already visible to the host.
pub struct UsbMounter {
    /// Device path, e.g. `/dev/sdb1`.
    pub device: String,
    /// Local mount point.
    pub mount_point: PathBuf,
}

impl Mounter for UsbMounter {
    fn mount(&self) -> Result<PathBuf, MigrationError> {
        if is_mounted(&self.mount_point) {
            return Ok(self.mount_point.clone());
        }
        std::fs::create_dir_all(&self.mount_point).map_err(|e| {
            MigrationError::new(MOUNT_001, format!("failed to create mount point {}", self.mount_point.display())).with_cause(&e)
        })?;
        run("mount", &[&self.device, &self.mount_point.to_string_lossy()], MOUNT_002)?;
        if !is_mounted(&self.mount_point) {
            return Err(MigrationError::new(MOUNT_002, "mount command succeeded but the device is not mounted"));
        }
        Ok(self.mount_point.clone())
    }

    fn unmount(&self) -> Result<(), MigrationError> {
        if !is_mounted(&self.mount_point) {
            return Ok(());
        }
        run("umount", &[&self.mount_point.to_string_lossy()], MOUNT_003)
    }
}
