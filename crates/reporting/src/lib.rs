#![deny(missing_docs)]

//! # Overview
//!
//! Owned, mutex-guarded accumulator for the per-run migration report. The
//! engine's copy workers, phase B renamer, and phase C normalizer all hold a
//! shared `&ReportAccumulator` and call its narrow recording methods; nothing
//! outside this crate ever locks the underlying data directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use errors::{MigrationError, SYSTEM_001};
use serde::{Deserialize, Serialize};

/// One successfully copied-and-verified file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopiedEntry {
    /// Destination path, relative to the target home.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// A file whose verification failed after copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Destination path, relative to the target home.
    pub path: PathBuf,
    /// Why verification failed (digest mismatch, size mismatch, I/O error).
    pub reason: String,
}

/// A phase B directory rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRecord {
    /// Path before the rename, relative to the target home.
    pub from: PathBuf,
    /// Path after the rename, relative to the target home.
    pub to: PathBuf,
}

#[derive(Debug, Default)]
struct ReportData {
    copied: Vec<CopiedEntry>,
    skipped: Vec<PathBuf>,
    discrepancies: Vec<Discrepancy>,
    renames: Vec<RenameRecord>,
}

/// An immutable point-in-time view of a [`ReportAccumulator`], suitable for
/// serialization to disk or embedding in a log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    /// User this report covers.
    pub user: String,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Files copied and verified.
    pub copied: Vec<CopiedEntry>,
    /// Files skipped because the destination was already up to date.
    pub skipped: Vec<PathBuf>,
    /// Files that failed verification.
    pub discrepancies: Vec<Discrepancy>,
    /// Directory renames applied in phase B.
    pub renames: Vec<RenameRecord>,
    /// Total bytes copied, derived from `copied`.
    pub bytes_copied: u64,
}

/// Thread-safe accumulator for one user's migration report. Cheap to share
/// across the copy worker pool behind an `Arc`.
#[derive(Debug)]
pub struct ReportAccumulator {
    user: String,
    data: Mutex<ReportData>,
}

impl ReportAccumulator {
    /// Creates an empty accumulator for `user`.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), data: Mutex::new(ReportData::default()) }
    }

    /// Records a successfully copied and verified file.
    pub fn record_copied(&self, path: impl Into<PathBuf>, size: u64) {
        let mut data = self.data.lock().expect("report mutex poisoned");
        data.copied.push(CopiedEntry { path: path.into(), size });
    }

    /// Records a file skipped because the destination was already up to date.
    pub fn record_skipped(&self, path: impl Into<PathBuf>) {
        let mut data = self.data.lock().expect("report mutex poisoned");
        data.skipped.push(path.into());
    }

    /// Records a file that failed verification.
    pub fn record_discrepancy(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        let mut data = self.data.lock().expect("report mutex poisoned");
        data.discrepancies.push(Discrepancy { path: path.into(), reason: reason.into() });
    }

    /// Records a phase B directory rename.
    pub fn record_rename(&self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) {
        let mut data = self.data.lock().expect("report mutex poisoned");
        data.renames.push(RenameRecord { from: from.into(), to: to.into() });
    }

    /// Takes an immutable snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ReportSnapshot {
        let data = self.data.lock().expect("report mutex poisoned");
        let bytes_copied = data.copied.iter().map(|e| e.size).sum();
        ReportSnapshot {
            user: self.user.clone(),
            timestamp: Utc::now(),
            copied: data.copied.clone(),
            skipped: data.skipped.clone(),
            discrepancies: data.discrepancies.clone(),
            renames: data.renames.clone(),
            bytes_copied,
        }
    }
}

/// Writes `snapshot` as pretty JSON to `report_dir/{user}.json`, via a
/// same-directory temp file plus rename so a reader never observes a
/// partially written report.
pub fn write_report(report_dir: &Path, snapshot: &ReportSnapshot) -> Result<PathBuf, MigrationError> {
    std::fs::create_dir_all(report_dir).map_err(|e| {
        MigrationError::new(SYSTEM_001, format!("failed to create report directory {}", report_dir.display()))
            .with_cause(&e)
    })?;

    let final_path = report_dir.join(format!("{}.json", snapshot.user));
    let temp_path = report_dir.join(format!(".{}.json.tmp", snapshot.user));

    let body = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| MigrationError::new(SYSTEM_001, "failed to serialize report").with_cause(&e))?;
    std::fs::write(&temp_path, body).map_err(|e| {
        MigrationError::new(SYSTEM_001, format!("failed to write report temp file {}", temp_path.display()))
            .with_cause(&e)
    })?;
    std::fs::rename(&temp_path, &final_path).map_err(|e| {
        MigrationError::new(SYSTEM_001, format!("failed to rename report into place at {}", final_path.display()))
            .with_cause(&e)
    })?;

    Ok(final_path)
}

/// Aggregate byte/file counters across every user processed in a run, kept
/// by the orchestrator for the end-of-run summary log line.
#[derive(Debug, Default)]
pub struct RunTotals {
    per_user_bytes: BTreeMap<String, u64>,
}

impl RunTotals {
    /// Creates an empty totals tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one user's snapshot into the running totals.
    pub fn absorb(&mut self, snapshot: &ReportSnapshot) {
        self.per_user_bytes.insert(snapshot.user.clone(), snapshot.bytes_copied);
    }

    /// Total bytes copied across every absorbed user.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.per_user_bytes.values().sum()
    }

    /// Number of distinct users absorbed so far.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.per_user_bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let acc = ReportAccumulator::new("alice@default");
        acc.record_copied("Documents/a.txt", 100);
        acc.record_copied("Documents/b.txt", 50);
        acc.record_skipped("Documents/c.txt");
        acc.record_discrepancy("Documents/d.txt", "digest mismatch");
        acc.record_rename("Desktop", "Desktops/Desktop1");

        let snap = acc.snapshot();
        assert_eq!(snap.copied.len(), 2);
        assert_eq!(snap.bytes_copied, 150);
        assert_eq!(snap.skipped.len(), 1);
        assert_eq!(snap.discrepancies.len(), 1);
        assert_eq!(snap.renames.len(), 1);
    }

    #[test]
    fn write_report_produces_readable_json_with_no_leftover_temp_file() {
        let dir = tempdir().unwrap();
        let acc = ReportAccumulator::new("bob@default");
        acc.record_copied("a.txt", 10);
        let snapshot = acc.snapshot();

        let path = write_report(dir.path(), &snapshot).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join(".bob@default.json.tmp").exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: ReportSnapshot = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.user, "bob@default");
        assert_eq!(parsed.bytes_copied, 10);
    }

    #[test]
    fn run_totals_sum_across_users() {
        let mut totals = RunTotals::new();
        let acc_a = ReportAccumulator::new("a");
        acc_a.record_copied("x", 10);
        let acc_b = ReportAccumulator::new("b");
        acc_b.record_copied("y", 20);

        totals.absorb(&acc_a.snapshot());
        totals.absorb(&acc_b.snapshot());

        assert_eq!(totals.total_bytes(), 30);
        assert_eq!(totals.user_count(), 2);
    }
}
