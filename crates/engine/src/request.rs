//! Per-user migration request: everything phase A/B/C need, resolved once by
//! the orchestrator and handed to [`crate::migrate_user`] unchanged.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use checksums::HashAlgorithm;

/// Which integrity check phase A runs after each copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityMethod {
    /// Prefer a precomputed hash-index lookup, falling back to a freshly
    /// computed digest comparison.
    Hash,
    /// Byte-length equality only.
    Size,
    /// Byte-length and integer-second mtime equality.
    Metadata,
}

/// Immutable per-user input to the two-phase engine.
#[derive(Debug, Clone)]
pub struct UserMigrationRequest {
    /// The Windows-era username as it appeared on the source host, typically `user.domainsuffix`.
    pub username: String,
    /// Absolute path to this user's directory on the mounted source.
    pub source_dir: PathBuf,
    /// Absolute path to the user's target home directory on this host.
    pub target_home: PathBuf,
    /// Directory names pruned from the walk by relative path.
    pub exclude_dirs: Vec<String>,
    /// Glob patterns excluding individual files.
    pub exclude_file_globs: Vec<String>,
    /// Selected integrity method.
    pub integrity: IntegrityMethod,
    /// Hash algorithm used when `integrity` is [`IntegrityMethod::Hash`].
    pub hash_algorithm: HashAlgorithm,
    /// Verification retry count (beyond the first attempt).
    pub retries: u32,
    /// Delay between verification retries.
    pub retry_delay: Duration,
    /// Hash index loaded once per run by the orchestrator, shared across users.
    pub hash_index: Option<Arc<HashMap<String, String>>>,
    /// Domain-suffix lookup used by `format_username_for_linux`.
    pub domain_suffix_map: BTreeMap<String, String>,
    /// `/etc/skel`-equivalent directory copied into a brand-new home.
    pub skel_dir: PathBuf,
    /// Local group assigned to the target home in phase C.
    pub group_name: String,
}

/// Final per-user status, mirroring [`journal::UserStatus`]'s terminal variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    /// Every file copied and verified, no failures.
    Success,
    /// Completed, but at least one file discrepancy was recorded.
    CompletedWithError,
    /// Aborted by an unrecoverable copy failure.
    Failed,
    /// Already complete on a prior run; the engine did no work.
    AlreadyComplete,
}
