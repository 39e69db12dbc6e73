//! On-disk configuration: a YAML document deserialized with `serde_yaml`,
//! validated at load time, with credential material decrypted lazily
//! through the [`CredentialDecryptor`](crate::credentials::CredentialDecryptor)
//! collaborator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use errors::{CONFIG_001, MigrationError};
use serde::{Deserialize, Serialize};

/// Where the source tree lives before it is mounted locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A CIFS/DFS network share.
    Network,
    /// A removable USB volume.
    Usb,
}

/// Integrity verification strategy, mirrors [`engine::IntegrityMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityMethod {
    /// Compare a cryptographic hash (index lookup, falling back to a fresh hash).
    Hash,
    /// Compare only file size.
    Size,
    /// Compare size and mtime.
    Metadata,
}

impl From<IntegrityMethod> for engine::IntegrityMethod {
    fn from(value: IntegrityMethod) -> Self {
        match value {
            IntegrityMethod::Hash => engine::IntegrityMethod::Hash,
            IntegrityMethod::Size => engine::IntegrityMethod::Size,
            IntegrityMethod::Metadata => engine::IntegrityMethod::Metadata,
        }
    }
}

/// The full on-disk configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the source tree lives.
    pub source_type: SourceType,
    /// Network share UNC path or device path, depending on `source_type`.
    pub source_root: String,
    /// Local mount point the source is attached at.
    pub mount_point: PathBuf,
    /// Reference to the credential used to mount the source (username).
    pub credential_user: Option<String>,
    /// The credential secret, possibly Fernet-encrypted (see `encrypted`).
    pub credential_pass: Option<String>,
    /// Whether `credential_pass` is at rest in encrypted form.
    #[serde(default)]
    pub credential_encrypted: bool,
    /// Top-level source directories to skip entirely.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns matched against file basenames to skip.
    #[serde(default)]
    pub exclude_file_globs: Vec<String>,
    /// How each copied file's integrity is verified.
    pub integrity: IntegrityMethod,
    /// Hash algorithm used when `integrity` is `hash` (`"sha256"` or `"md5"`).
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,
    /// Path to a prebuilt SQLite hash index, used when `integrity` is `hash`.
    pub hash_index_path: Option<PathBuf>,
    /// Per-file copy retry count.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Delay between copy retries, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Mount attempt count.
    #[serde(default = "default_mount_attempts")]
    pub mount_attempts: u32,
    /// Delay between mount attempts, in milliseconds.
    #[serde(default = "default_mount_delay_ms")]
    pub mount_delay_ms: u64,
    /// Maps a Windows domain suffix (the part after the first `.` in a
    /// username) to the Linux account domain used in `user@domain`.
    #[serde(default)]
    pub domain_suffix_map: BTreeMap<String, String>,
    /// Local path for the journal's local-write copy.
    pub local_state_path: PathBuf,
    /// Remote (shared/network) path for the journal's dual-write copy.
    pub network_state_path: PathBuf,
    /// Directory per-run reports are written into.
    pub report_dir: PathBuf,
    /// Heartbeat interval, in seconds.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// `/etc/skel`-equivalent directory copied into brand-new home directories.
    pub skel_dir: PathBuf,
    /// Local group newly-created home directories are chowned to.
    #[serde(default = "default_group_name")]
    pub group_name: String,
    /// Root directory new Linux home directories are created under.
    #[serde(default = "default_target_home_root")]
    pub target_home_root: PathBuf,
}

fn default_hash_algorithm() -> String {
    "sha256".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_mount_attempts() -> u32 {
    3
}

fn default_mount_delay_ms() -> u64 {
    5_000
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_group_name() -> String {
    "domain users".to_string()
}

fn default_target_home_root() -> PathBuf {
    PathBuf::from("/home")
}

impl Config {
    /// Loads and validates a configuration document from `path`.
    pub fn load(path: &Path) -> Result<Self, MigrationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::new(CONFIG_001, format!("failed to read config file {}", path.display())).with_cause(&e)
        })?;
        let config: Config = serde_yaml::from_str(&raw).map_err(|e| {
            MigrationError::new(CONFIG_001, format!("failed to parse config file {}", path.display())).with_cause(&e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this document back to `path` as YAML, matching the formatting
    /// the `--encrypt-all`/`--encrypt-pass` modes rely on to rewrite in place.
    pub fn save(&self, path: &Path) -> Result<(), MigrationError> {
        let raw = serde_yaml::to_string(self).map_err(|e| {
            MigrationError::new(CONFIG_001, format!("failed to serialize config for {}", path.display())).with_cause(&e)
        })?;
        std::fs::write(path, raw).map_err(|e| {
            MigrationError::new(CONFIG_001, format!("failed to write config file {}", path.display())).with_cause(&e)
        })
    }

    fn validate(&self) -> Result<(), MigrationError> {
        if self.source_root.trim().is_empty() {
            return Err(MigrationError::new(CONFIG_001, "source_root must not be empty"));
        }
        if self.integrity == IntegrityMethod::Hash && self.hash_index_path.is_none() {
            tracing::warn!("integrity method is 'hash' but no hash_index_path was configured; falling back to fresh hashing");
        }
        checksums::HashAlgorithm::parse(&self.hash_algorithm)?;
        if self.local_state_path.as_os_str().is_empty() {
            return Err(MigrationError::new(CONFIG_001, "local_state_path must not be empty"));
        }
        if self.network_state_path.as_os_str().is_empty() {
            return Err(MigrationError::new(CONFIG_001, "network_state_path must not be empty"));
        }
        Ok(())
    }

    /// Retry delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Mount delay as a [`Duration`].
    #[must_use]
    pub fn mount_delay(&self) -> Duration {
        Duration::from_millis(self.mount_delay_ms)
    }

    /// Heartbeat interval as a [`Duration`].
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Parses `hash_algorithm`, already validated at load time.
    pub fn parsed_hash_algorithm(&self) -> Result<checksums::HashAlgorithm, MigrationError> {
        checksums::HashAlgorithm::parse(&self.hash_algorithm)
    }
}
