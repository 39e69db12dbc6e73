//! External collaborator interfaces consumed by the orchestrator.
//!
//! Everything in this module is out of scope for this implementation — remote
//! mounting, disk enumeration, shortcut/printer registration, reporting and
//! notification transport, and license validation are all environment-specific
//! integrations. Only the interfaces are specified here; failures from any of
//! them except [`Mounter`] are isolated and logged rather than propagated.

use std::collections::BTreeMap;
use std::path::PathBuf;

use errors::MigrationError;

/// Mounts and unmounts the migration source. Must be idempotent: calling
/// `mount` twice without an intervening `unmount` returns the same path.
pub trait Mounter {
    /// Mounts the source, returning the local path files can be read from.
    fn mount(&self) -> Result<PathBuf, MigrationError>;
    /// Unmounts the source. Safe to call even if never mounted.
    fn unmount(&self) -> Result<(), MigrationError>;
}

/// Enumerates non-primary disks visible to the host, mapping a drive letter
/// to its local mount point. Used only by shortcut translation; optional.
pub trait DiskEnumerator {
    /// Returns the currently visible non-primary disks.
    fn enumerate(&self) -> Result<BTreeMap<String, PathBuf>, MigrationError>;
}

/// Creates Linux desktop-entry equivalents of Windows shortcuts found under
/// a migrated user's Desktop.
pub trait ShortcutCreator {
    /// Translates one shortcut target into a desktop entry under `home`.
    fn create(&self, home: &std::path::Path, shortcut_name: &str, target: &str) -> Result<(), MigrationError>;
}

/// Registers a user's configured network printers with the local printing
/// subsystem (e.g. CUPS).
pub trait PrinterRegistrar {
    /// Registers `printers` for `linux_username`.
    fn register(&self, linux_username: &str, printers: &[String]) -> Result<(), MigrationError>;
}

/// Delivers the per-run report (see `reporting::ReportSnapshot`) to an
/// external sink (ticketing system, object storage, etc).
pub trait Reporter {
    /// Submits a report snapshot, already serialized to JSON.
    fn submit(&self, report_json: &str) -> Result<(), MigrationError>;
}

/// Sends operator-facing notifications (email, chat webhook) about run
/// completion or failure.
pub trait Notifier {
    /// Sends a one-line notification.
    fn notify(&self, message: &str) -> Result<(), MigrationError>;
}

/// Loads a prebuilt hash index ahead of a run, decoupling the orchestrator
/// from the concrete storage backend (`checksums::hash_index` by default).
pub trait HashIndexProvider {
    /// Loads the index as `path -> hash` pairs.
    fn load(&self) -> Result<BTreeMap<String, String>, MigrationError>;
}

/// Loads the on-disk [`crate::config::Config`] document. The default
/// implementation reads straight from disk; tests substitute an in-memory one.
pub trait ConfigLoader {
    /// Loads and validates the configuration.
    fn load(&self) -> Result<crate::config::Config, MigrationError>;
}

/// Loads a [`crate::config::Config`] from a fixed path on disk.
pub struct FileConfigLoader {
    /// Path to the YAML configuration file.
    pub path: PathBuf,
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self) -> Result<crate::config::Config, MigrationError> {
        crate::config::Config::load(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_config_loader_reads_from_the_given_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
source_type: usb
source_root: /media/usb0
mount_point: /mnt/migration
integrity: size
local_state_path: /var/lib/astra-migrate/state.json
network_state_path: /mnt/migration/.astra-migrate/state.json
report_dir: /var/lib/astra-migrate/reports
skel_dir: /etc/skel
"#,
        )
        .unwrap();

        let loader = FileConfigLoader { path: path.clone() };
        let config = loader.load().unwrap();
        assert_eq!(config.mount_point, PathBuf::from("/mnt/migration"));
    }
}
