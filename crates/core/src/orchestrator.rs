//! The orchestrator loop (C6): mounts the source, enumerates users, invokes
//! the per-user engine for each, and maintains the journal throughout.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use errors::{MigrationError, MOUNT_001, USER_003};
use journal::{GlobalStatus, JournalPaths, JournalStore, UserStatus};
use reporting::{write_report, ReportAccumulator, RunTotals};

use crate::collaborators::{Mounter, PrinterRegistrar, ShortcutCreator};
use crate::config::Config;

/// Cooperative cancellation signal, consulted between users and between
/// files within a user (never mid-file).
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Builds a fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Overall result of one orchestrator run, independent of the exit code the
/// CLI derives from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every user migrated without error.
    Success,
    /// The run completed but at least one user failed or finished with a
    /// recorded discrepancy.
    CompletedWithError,
    /// A fatal, run-aborting failure (mount, enumeration, or journal write).
    Failed,
}

/// Optional, best-effort collaborators invoked after each user's core
/// migration; failures are isolated and never change the user's outcome.
#[derive(Default)]
pub struct Collaborators<'a> {
    /// Translates Desktop shortcuts into desktop-entry files.
    pub shortcut_creator: Option<&'a dyn ShortcutCreator>,
    /// Registers a user's configured network printers locally.
    pub printer_registrar: Option<&'a dyn PrinterRegistrar>,
}

/// Spawns the heartbeat task: every `interval`, updates the journal's
/// `last_heartbeat` field. Stops as soon as `cancel` is observed.
fn spawn_heartbeat(store: Arc<JournalStore>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !cancel.is_cancelled() {
            std::thread::sleep(interval);
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = store.update_global(|g| g.last_heartbeat = Utc::now()) {
                tracing::warn!(error = %e, "heartbeat failed to update journal");
            }
        }
    })
}

fn mount_with_retry(mounter: &dyn Mounter, config: &Config) -> Result<std::path::PathBuf, MigrationError> {
    let mut last_err = None;
    for attempt in 1..=config.mount_attempts {
        match mounter.mount() {
            Ok(path) => return Ok(path),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "mount attempt failed");
                last_err = Some(e);
                if attempt < config.mount_attempts {
                    std::thread::sleep(config.mount_delay());
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| MigrationError::new(MOUNT_001, "mount failed with no recorded error")))
}

/// Lists the top-level user directories under the mounted source, minus
/// `config.exclude_dirs`.
fn enumerate_users(mount_root: &std::path::Path, config: &Config) -> Result<Vec<String>, MigrationError> {
    let read_dir = std::fs::read_dir(mount_root).map_err(|e| {
        MigrationError::new(MOUNT_001, format!("failed to enumerate users under {}", mount_root.display())).with_cause(&e)
    })?;

    let mut users = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| MigrationError::new(MOUNT_001, "failed to read a source directory entry").with_cause(&e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| MigrationError::new(MOUNT_001, "failed to stat a source directory entry").with_cause(&e))?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if config.exclude_dirs.iter().any(|excluded| excluded == &name) {
            continue;
        }
        users.push(name);
    }
    users.sort();
    Ok(users)
}

/// Runs one full migration: mount, enumerate, migrate every user, unmount.
///
/// `hash_index` is the preloaded hash table (if `config.integrity` is `hash`
/// and a hash index path was configured); the caller loads it once up front
/// since it is shared read-only across every user.
pub fn run(
    config: &Config,
    mounter: &dyn Mounter,
    hash_index: Option<Arc<HashMap<String, String>>>,
    collaborators: &Collaborators<'_>,
    cancel: CancellationToken,
) -> Result<RunOutcome, MigrationError> {
    let state_dir = config
        .local_state_path
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    std::fs::create_dir_all(&state_dir).map_err(|e| {
        MigrationError::new(MOUNT_001, format!("failed to create state directory {}", state_dir.display())).with_cause(&e)
    })?;

    let paths = JournalPaths::under(&state_dir, config.network_state_path.clone());
    let store = Arc::new(JournalStore::new(paths, Duration::from_secs(5)));

    let mount_root = match mount_with_retry(mounter, config) {
        Ok(path) => path,
        Err(e) => {
            let fatal = e.is_fatal();
            store.update_global(|g| {
                g.transition(GlobalStatus::Failed);
                g.last_error = Some(e.clone());
            })?;
            return Ok(if fatal { RunOutcome::Failed } else { RunOutcome::CompletedWithError });
        }
    };

    let users = match enumerate_users(&mount_root, config) {
        Ok(users) => users,
        Err(e) => {
            let fatal = e.is_fatal();
            let _ = mounter.unmount();
            store.update_global(|g| {
                g.transition(GlobalStatus::Failed);
                g.last_error = Some(e.clone());
            })?;
            return Ok(if fatal { RunOutcome::Failed } else { RunOutcome::CompletedWithError });
        }
    };

    store.update_global(|g| {
        g.transition(GlobalStatus::InProgress);
        g.total_users = users.len() as u32;
    })?;

    let heartbeat = spawn_heartbeat(Arc::clone(&store), config.heartbeat_interval(), cancel.clone());

    let mut totals = RunTotals::default();
    let mut any_failed = false;
    let mut any_completed_with_error = false;

    for username in &users {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = migrate_one_user(config, &mount_root, username, hash_index.as_ref(), &store, collaborators);
        match outcome {
            Ok(snapshot) => {
                totals.absorb(&snapshot);
            }
            Err(e) => {
                tracing::error!(error = %e, user = %username, "unhandled error migrating user");
                any_failed = true;
                let fatal = e.is_fatal();
                store.update_global(|g| g.last_error = Some(e.clone()))?;
                if fatal {
                    tracing::error!(user = %username, "error category is fatal; aborting remaining users");
                    break;
                }
            }
        }
    }

    cancel.cancel();
    let _ = heartbeat.join();

    let doc = store.load()?;
    for record in doc.users.values() {
        match record.status {
            Some(UserStatus::Failed) => any_failed = true,
            Some(UserStatus::CompletedWithError) => any_completed_with_error = true,
            _ => {}
        }
    }

    let _ = mounter.unmount();

    let final_status = if any_failed {
        GlobalStatus::Failed
    } else if any_completed_with_error {
        GlobalStatus::CompletedWithError
    } else {
        GlobalStatus::Success
    };
    store.update_global(|g| g.transition(final_status))?;

    let _ = write_report(&config.report_dir, &reporting::ReportSnapshot {
        user: "run-totals".to_string(),
        timestamp: Utc::now(),
        copied: Vec::new(),
        skipped: Vec::new(),
        discrepancies: Vec::new(),
        renames: Vec::new(),
        bytes_copied: totals.total_bytes(),
    });

    Ok(match final_status {
        GlobalStatus::Failed => RunOutcome::Failed,
        GlobalStatus::CompletedWithError => RunOutcome::CompletedWithError,
        _ => RunOutcome::Success,
    })
}

fn migrate_one_user(
    config: &Config,
    mount_root: &std::path::Path,
    windows_username: &str,
    hash_index: Option<&Arc<HashMap<String, String>>>,
    store: &JournalStore,
    collaborators: &Collaborators<'_>,
) -> Result<reporting::ReportSnapshot, MigrationError> {
    let linux_username = engine::format_username_for_linux(windows_username, &config.domain_suffix_map)?;

    let doc = store.load()?;
    if let Some(record) = doc.users.get(&linux_username) {
        if matches!(record.status, Some(UserStatus::Success) | Some(UserStatus::CompletedWithError)) {
            tracing::info!(user = %linux_username, "user already migrated; skipping");
            return Ok(reporting::ReportAccumulator::new(linux_username.clone()).snapshot());
        }
    }

    store.update_global(|g| {
        g.current_user = Some(linux_username.clone());
        g.users_in_progress = 1;
    })?;
    store.update_user(&linux_username, UserStatus::InProgress)?;

    let mut checkpoint = doc
        .users
        .get(&linux_username)
        .map(|r| r.checkpoints.clone())
        .unwrap_or_default();

    let request = engine::UserMigrationRequest {
        username: windows_username.to_string(),
        source_dir: mount_root.join(windows_username),
        target_home: config.target_home_root.join(&linux_username),
        exclude_dirs: config.exclude_dirs.clone(),
        exclude_file_globs: config.exclude_file_globs.clone(),
        integrity: config.integrity.into(),
        hash_algorithm: config.parsed_hash_algorithm()?,
        retries: config.retries,
        retry_delay: config.retry_delay(),
        hash_index: hash_index.cloned(),
        domain_suffix_map: config.domain_suffix_map.clone(),
        skel_dir: config.skel_dir.clone(),
        group_name: config.group_name.clone(),
    };

    let report = ReportAccumulator::new(linux_username.clone());
    let result = engine::migrate_user(&request, &mut checkpoint, &report);

    let snapshot = report.snapshot();
    if let Err(e) = write_report(&config.report_dir, &snapshot) {
        tracing::warn!(error = %e, user = %linux_username, "failed to write per-user report");
    }

    let (status, error) = match &result {
        Ok(engine::UserOutcome::Success | engine::UserOutcome::AlreadyComplete) => (UserStatus::Success, None),
        Ok(engine::UserOutcome::CompletedWithError) => (UserStatus::CompletedWithError, None),
        Ok(engine::UserOutcome::Failed) => (UserStatus::Failed, None),
        Err(e) => (
            UserStatus::Failed,
            Some(MigrationError::new(USER_003, format!("unhandled engine error for {linux_username}")).with_cause(e)),
        ),
    };

    let mut doc = store.load()?;
    {
        let record = doc.users.entry(linux_username.clone()).or_default();
        record.status = Some(status);
        record.checkpoints = checkpoint;
    }
    doc.global.current_user = None;
    doc.global.users_in_progress = 0;
    match status {
        UserStatus::Success => doc.global.users_completed += 1,
        UserStatus::CompletedWithError => doc.global.users_completed += 1,
        UserStatus::Failed => doc.global.users_failed += 1,
        _ => {}
    }
    if let Some(err) = error {
        doc.global.last_error = Some(err);
    }
    store.write(&doc)?;

    if let Some(creator) = collaborators.shortcut_creator {
        let home = config.target_home_root.join(&linux_username);
        let desktop = home.join("Desktops/Desktop1");
        if let Ok(read_dir) = std::fs::read_dir(&desktop) {
            for entry in read_dir.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if let Err(e) = creator.create(&home, &name, &entry.path().to_string_lossy()) {
                    tracing::warn!(error = %e, user = %linux_username, "shortcut translation failed");
                }
            }
        }
    }
    if let Some(registrar) = collaborators.printer_registrar {
        if let Err(e) = registrar.register(&linux_username, &[]) {
            tracing::warn!(error = %e, user = %linux_username, "printer registration failed");
        }
    }

    if let Err(e) = result {
        return Err(e);
    }

    Ok(snapshot)
}
