#![deny(missing_docs)]

//! # Overview
//!
//! Crash-consistent, concurrently-read, atomically-written global migration
//! state (C4). Every write replaces a sibling temp file with [`std::fs::rename`]
//! so a reader never observes a half-written document, and every write is
//! guarded by an exclusive advisory lock on a sidecar `.lock` file with a
//! bounded acquisition timeout — when the lock cannot be acquired in time the
//! write still proceeds, in degraded mode, with a warning logged.
//!
//! The store always writes `local_state`; `network_state` is attempted
//! best-effort and its failure does not fail the overall write. Three
//! additional local projections (`service_full`, `service_minimal`,
//! `supervisor_projection`) are written last, in that order, so a fresh
//! supervisor projection implies the main document committed successfully.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use errors::{ErrorRecord, MigrationError, SYSTEM_001};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);
const RMW_RETRIES: u32 = 5;

/// Overall run status, mirrored from the per-user statuses by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalStatus {
    /// No run has started yet.
    Idle,
    /// A run is currently executing.
    InProgress,
    /// Every user completed with no discrepancies or copy failures.
    Success,
    /// The run could not continue (init/config/mount/source failure, or cancellation).
    Failed,
    /// The run finished, but at least one user had a discrepancy or per-user failure.
    CompletedWithError,
}

/// Per-user migration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Not yet started.
    Pending,
    /// Currently running; a checkpoint may exist.
    InProgress,
    /// Completed with no discrepancies.
    Success,
    /// Completed, but at least one file discrepancy was recorded.
    CompletedWithError,
    /// Aborted by an unrecoverable copy or engine failure.
    Failed,
}

/// The top-level, orchestrator-owned run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// Current overall status.
    pub status: GlobalStatus,
    /// When this document was last written.
    pub last_update: DateTime<Utc>,
    /// When the orchestrator's heartbeat task last ran.
    pub last_heartbeat: DateTime<Utc>,
    /// User currently being migrated, if any.
    pub current_user: Option<String>,
    /// Total users discovered this run.
    pub total_users: u32,
    /// Users that finished with `success`.
    pub users_completed: u32,
    /// Users that finished with `failed`.
    pub users_failed: u32,
    /// Users currently `in_progress`.
    pub users_in_progress: u32,
    /// Most recent structured error, if any.
    pub last_error: Option<ErrorRecord>,
}

impl Default for GlobalState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            status: GlobalStatus::Idle,
            last_update: now,
            last_heartbeat: now,
            current_user: None,
            total_users: 0,
            users_completed: 0,
            users_failed: 0,
            users_in_progress: 0,
            last_error: None,
        }
    }
}

impl GlobalState {
    /// Transitions `status`, honoring the invariant that `success` is
    /// terminal-monotonic: once `success`, only another `success` write is a
    /// no-op; any later failure flips to `failed` rather than being ignored.
    pub fn transition(&mut self, next: GlobalStatus) {
        if self.status == GlobalStatus::Success && next == GlobalStatus::Success {
            return;
        }
        self.status = next;
        self.last_update = Utc::now();
    }
}

/// One tracked file's copy-and-verify progress, keyed by absolute source path
/// in [`UserRecord::checkpoints`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCheckpoint {
    /// Destination path under the target home.
    pub target_path: PathBuf,
    /// Source file size in bytes at the time of copy.
    pub size: u64,
    /// Source mtime, as Unix seconds, at the time of copy.
    pub mtime: i64,
    /// Whether integrity verification passed.
    pub verified: bool,
    /// When this checkpoint entry was written.
    pub timestamp: DateTime<Utc>,
}

/// Per-user status plus resumable per-file checkpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    /// Current status, defaulting to `pending` for a user seen for the first time.
    pub status: Option<UserStatus>,
    /// Checkpoints keyed by absolute source path.
    pub checkpoints: BTreeMap<String, FileCheckpoint>,
}

/// The full journal document: global state plus every user's record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalDocument {
    /// Global run state.
    pub global: GlobalState,
    /// Per-user records, keyed by the formatted Linux username.
    pub users: BTreeMap<String, UserRecord>,
}

/// A precomputed, read-only summary written to `service_minimal` and
/// `supervisor_projection` — a strict subset of [`JournalDocument`] sized so
/// a supervisor can poll it cheaply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorProjection {
    /// Mirrors [`GlobalState::status`].
    pub status: GlobalStatus,
    /// Mirrors [`GlobalState::last_heartbeat`].
    pub last_heartbeat: DateTime<Utc>,
    /// Mirrors [`GlobalState::current_user`].
    pub current_user: Option<String>,
    /// Mirrors [`GlobalState::total_users`].
    pub total_users: u32,
    /// Mirrors [`GlobalState::users_completed`].
    pub users_completed: u32,
    /// Mirrors [`GlobalState::users_failed`].
    pub users_failed: u32,
    /// Mirrors [`GlobalState::users_in_progress`].
    pub users_in_progress: u32,
    /// `(users_completed + users_failed) / total_users * 100`, or 0 when no users yet.
    pub progress_percent: u8,
    /// Code of the most recent error, if any.
    pub last_error_code: Option<String>,
}

impl From<&GlobalState> for SupervisorProjection {
    fn from(global: &GlobalState) -> Self {
        let done = global.users_completed + global.users_failed;
        let progress_percent = if global.total_users == 0 {
            0
        } else {
            ((done as u64 * 100) / global.total_users as u64) as u8
        };
        Self {
            status: global.status,
            last_heartbeat: global.last_heartbeat,
            current_user: global.current_user.clone(),
            total_users: global.total_users,
            users_completed: global.users_completed,
            users_failed: global.users_failed,
            users_in_progress: global.users_in_progress,
            progress_percent,
            last_error_code: global.last_error.as_ref().map(|e| e.code.clone()),
        }
    }
}

/// File paths the store reads from and writes to.
#[derive(Debug, Clone)]
pub struct JournalPaths {
    /// Canonical document, written to the mounted remote share when reachable.
    pub network_state: PathBuf,
    /// Canonical document, always written locally.
    pub local_state: PathBuf,
    /// Full-document local copy for consumers that want the complete state.
    pub service_full: PathBuf,
    /// Summary local copy for lightweight pollers.
    pub service_minimal: PathBuf,
    /// Summary local copy read exclusively by the supervisor.
    pub supervisor_projection: PathBuf,
    /// Sidecar advisory-lock file guarding every write transaction.
    pub lock_file: PathBuf,
}

impl JournalPaths {
    /// Derives the standard sibling-file layout from a single state directory.
    #[must_use]
    pub fn under(state_dir: &Path, network_state: PathBuf) -> Self {
        Self {
            network_state,
            local_state: state_dir.join("local_state.json"),
            service_full: state_dir.join("service_full.json"),
            service_minimal: state_dir.join("service_minimal.json"),
            supervisor_projection: state_dir.join("supervisor_projection.json"),
            lock_file: state_dir.join(".journal.lock"),
        }
    }
}

/// The journal store: owns the file layout and lock, and performs every read
/// and read-modify-write operation against it.
pub struct JournalStore {
    paths: JournalPaths,
    lock_timeout: Duration,
}

impl JournalStore {
    /// Builds a store over `paths`, acquiring locks with up to `lock_timeout`
    /// before falling back to a degraded, unlocked write.
    #[must_use]
    pub fn new(paths: JournalPaths, lock_timeout: Duration) -> Self {
        Self { paths, lock_timeout }
    }

    /// Loads the document, preferring the remote copy, falling back to local,
    /// and finally an empty default if both are missing or unparseable.
    pub fn load(&self) -> Result<JournalDocument, MigrationError> {
        if let Some(doc) = read_json_tolerant(&self.paths.network_state) {
            return Ok(doc);
        }
        if let Some(doc) = read_json_tolerant(&self.paths.local_state) {
            return Ok(doc);
        }
        Ok(JournalDocument::default())
    }

    /// Writes `doc` to every file in the layout, local state unconditionally
    /// and the rest best-effort, under an advisory lock when one can be
    /// acquired within `lock_timeout`.
    pub fn write(&self, doc: &JournalDocument) -> Result<(), MigrationError> {
        let _guard = self.acquire_lock();

        atomic_write_json(&self.paths.local_state, doc)?;

        if let Err(err) = atomic_write_json(&self.paths.network_state, doc) {
            warn!(error = %err, "failed to write network_state; local_state still committed");
        }
        if let Err(err) = atomic_write_json(&self.paths.service_full, doc) {
            warn!(error = %err, "failed to write service_full projection");
        }

        let projection = SupervisorProjection::from(&doc.global);
        if let Err(err) = atomic_write_json(&self.paths.service_minimal, &projection) {
            warn!(error = %err, "failed to write service_minimal projection");
        }
        // Written last: its freshness implies local_state committed in this transaction.
        atomic_write_json(&self.paths.supervisor_projection, &projection)?;

        Ok(())
    }

    /// Reads, applies `patch` to the global state, and writes back, retrying
    /// the whole read-modify-write cycle up to [`RMW_RETRIES`] times.
    pub fn update_global(&self, patch: impl Fn(&mut GlobalState)) -> Result<(), MigrationError> {
        self.read_modify_write(|doc| patch(&mut doc.global))
    }

    /// Reads, sets `user`'s status, and writes back, creating the user's
    /// record if this is the first time it has been seen.
    pub fn update_user(&self, user: &str, status: UserStatus) -> Result<(), MigrationError> {
        self.read_modify_write(|doc| {
            let record = doc.users.entry(user.to_string()).or_default();
            record.status = Some(status);
        })
    }

    fn read_modify_write(&self, mutate: impl Fn(&mut JournalDocument)) -> Result<(), MigrationError> {
        let mut last_err = None;
        for _ in 0..RMW_RETRIES {
            let mut doc = match self.load() {
                Ok(doc) => doc,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            mutate(&mut doc);
            doc.global.last_update = Utc::now();
            match self.write(&doc) {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            MigrationError::new(SYSTEM_001, "read-modify-write exhausted retries with no recorded error")
        }))
    }

    fn acquire_lock(&self) -> Option<File> {
        if let Some(parent) = self.paths.lock_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(error = %e, "failed to create journal state directory; proceeding without a lock");
                return None;
            }
        }
        let file = match File::create(&self.paths.lock_file) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "failed to open journal lock file; proceeding without a lock");
                return None;
            }
        };

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Some(file),
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(_) => {
                    warn!("timed out acquiring journal lock; writing in degraded (unlocked) mode");
                    return None;
                }
            }
        }
    }
}

fn read_json_tolerant<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), MigrationError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| MigrationError::new(SYSTEM_001, format!("failed to create {}", parent.display())).with_cause(&e))?;

    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| MigrationError::new(SYSTEM_001, "failed to serialize journal document").with_cause(&e))?;

    let temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| MigrationError::new(SYSTEM_001, "failed to create journal temp file").with_cause(&e))?;
    write_all_and_sync(&temp, &body)
        .map_err(|e| MigrationError::new(SYSTEM_001, "failed to write journal temp file").with_cause(&e))?;

    temp.persist(path)
        .map_err(|e| MigrationError::new(SYSTEM_001, format!("failed to rename into place at {}", path.display())).with_cause(&e.error))?;
    Ok(())
}

fn write_all_and_sync(temp: &tempfile::NamedTempFile, body: &[u8]) -> io::Result<()> {
    use std::io::Write;
    let mut handle = temp.as_file();
    handle.write_all(body)?;
    handle.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> JournalStore {
        let paths = JournalPaths::under(dir, dir.join("network_state.json"));
        JournalStore::new(paths, Duration::from_millis(500))
    }

    #[test]
    fn load_on_empty_directory_returns_default_document() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let doc = store.load().unwrap();
        assert_eq!(doc.global.status, GlobalStatus::Idle);
        assert!(doc.users.is_empty());
    }

    #[test]
    fn write_then_load_round_trips_and_prefers_network_state() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut doc = JournalDocument::default();
        doc.global.transition(GlobalStatus::InProgress);
        doc.global.total_users = 3;
        store.write(&doc).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.global.status, GlobalStatus::InProgress);
        assert_eq!(loaded.global.total_users, 3);

        std::fs::remove_file(dir.path().join("network_state.json")).unwrap();
        let loaded_local = store.load().unwrap();
        assert_eq!(loaded_local.global.status, GlobalStatus::InProgress);
    }

    #[test]
    fn supervisor_projection_is_a_strict_subset_written_last() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let mut doc = JournalDocument::default();
        doc.global.total_users = 4;
        doc.global.users_completed = 2;
        store.write(&doc).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("supervisor_projection.json")).unwrap();
        let projection: SupervisorProjection = serde_json::from_str(&contents).unwrap();
        assert_eq!(projection.progress_percent, 50);
    }

    #[test]
    fn update_user_creates_and_then_updates_a_record() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.update_user("alice@default", UserStatus::InProgress).unwrap();
        store.update_user("alice@default", UserStatus::Success).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.users["alice@default"].status, Some(UserStatus::Success));
    }

    #[test]
    fn success_status_does_not_regress_on_a_redundant_success_transition() {
        let mut global = GlobalState::default();
        global.transition(GlobalStatus::Success);
        let first_update = global.last_update;
        global.transition(GlobalStatus::Success);
        assert_eq!(global.last_update, first_update);
    }

    #[test]
    fn a_later_failure_overrides_a_prior_success() {
        let mut global = GlobalState::default();
        global.transition(GlobalStatus::Success);
        global.transition(GlobalStatus::Failed);
        assert_eq!(global.status, GlobalStatus::Failed);
    }
}
