//! Phase A: breadth-first walk of the source tree, parallel copy to a worker
//! pool, and per-file integrity verification, preserving source structure
//! except for the browser-data redirection (which is not a simple rename).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use crossbeam_channel::bounded;
use errors::MigrationError;
use journal::FileCheckpoint;
use namereg::NameRegistry;
use pathmap::{PathMapping, TranslateOptions};
use reporting::ReportAccumulator;
use walk::WalkEntry;

use crate::request::{IntegrityMethod, UserMigrationRequest};

/// Whether phase A, taken as a whole, must fail the user.
#[derive(Debug, Default)]
pub(crate) struct PhaseAOutcome {
    pub any_copy_failed: bool,
    pub any_discrepancy: bool,
}

enum ItemOutcome {
    Copied,
    Skipped,
    Discrepancy,
    CopyFailed,
}

/// A mapping with only the browser-data redirection populated: phase A must
/// not apply `folder_mapping`/`desktop_rename`, those are deferred to phase B.
fn phase_a_view(full: &PathMapping) -> PathMapping {
    PathMapping {
        folder_mapping: BTreeMap::new(),
        desktop_rename: BTreeMap::new(),
        browser_redirect: full.browser_redirect.clone(),
    }
}

pub(crate) fn run_phase_a(
    request: &UserMigrationRequest,
    full_mapping: &PathMapping,
    checkpoint: &Mutex<BTreeMap<String, FileCheckpoint>>,
    report: &ReportAccumulator,
) -> Result<PhaseAOutcome, MigrationError> {
    let rules = filters::ExcludeRules::compile(&request.exclude_dirs, &request.exclude_file_globs)?;
    let mut entries = walk::walk(&request.source_dir, &rules)?;
    entries.sort_by(|a, b| b.mtime.cmp(&a.mtime));

    let view = phase_a_view(full_mapping);
    let registry = NameRegistry::new();
    let worker_count = std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1).max(2);

    let any_copy_failed = AtomicBool::new(false);
    let any_discrepancy = AtomicBool::new(false);

    let (sender, receiver) = bounded::<WalkEntry>(worker_count * 4);

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            let registry = &registry;
            scope.spawn(|| {
                for entry in receiver {
                    let outcome = process_one(request, full_mapping, &view, &entry, registry, checkpoint, report);
                    match outcome {
                        ItemOutcome::CopyFailed => any_copy_failed.store(true, Ordering::Relaxed),
                        ItemOutcome::Discrepancy => any_discrepancy.store(true, Ordering::Relaxed),
                        ItemOutcome::Copied | ItemOutcome::Skipped => {}
                    }
                }
            });
        }
        for entry in entries {
            // The channel is only ever dropped by this scope after every item is
            // sent, so a failed send here would mean a worker panicked.
            let _ = sender.send(entry);
        }
        drop(sender);
    });

    Ok(PhaseAOutcome {
        any_copy_failed: any_copy_failed.load(Ordering::Relaxed),
        any_discrepancy: any_discrepancy.load(Ordering::Relaxed),
    })
}

fn process_one(
    request: &UserMigrationRequest,
    full_mapping: &PathMapping,
    view: &PathMapping,
    entry: &WalkEntry,
    registry: &NameRegistry,
    checkpoint: &Mutex<BTreeMap<String, FileCheckpoint>>,
    report: &ReportAccumulator,
) -> ItemOutcome {
    let relative_str = entry.relative.to_string_lossy().to_string();
    let dest_relative = pathmap::translate(&relative_str, view, &TranslateOptions::default());
    let dest_dir_relative = Path::new(&dest_relative).parent().map(Path::to_path_buf).unwrap_or_default();
    let dest_dir = request.target_home.join(&dest_dir_relative);
    let candidate_name = Path::new(&dest_relative)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let checkpoint_key = entry.source.to_string_lossy().to_string();

    if let Some(existing) = checkpoint.lock().expect("checkpoint mutex poisoned").get(&checkpoint_key) {
        if existing.verified && metadata::destination_is_up_to_date(&entry.source, &existing.target_path) {
            report.record_skipped(entry.relative.clone());
            return ItemOutcome::Skipped;
        }
    }

    if let Err(e) = std::fs::create_dir_all(&dest_dir) {
        report.record_discrepancy(
            entry.relative.clone(),
            format!("failed to create destination directory {}: {e}", dest_dir.display()),
        );
        return ItemOutcome::CopyFailed;
    }

    let (final_name, rename_event) = registry.reserve(&dest_dir, &candidate_name);
    if let Some(event) = rename_event {
        report.record_rename(dest_dir.join(&event.original), dest_dir.join(&event.final_name));
    }
    let dest_final = dest_dir.join(final_name);

    if metadata::destination_is_up_to_date(&entry.source, &dest_final) {
        report.record_skipped(entry.relative.clone());
        store_checkpoint(checkpoint, &checkpoint_key, &dest_final, entry, true);
        return ItemOutcome::Skipped;
    }

    if let Err(e) = fast_io::copy_file(&entry.source, &dest_final) {
        report.record_discrepancy(entry.relative.clone(), format!("copy failed: {e}"));
        return ItemOutcome::CopyFailed;
    }

    if let Err(e) = metadata::preserve_metadata(&entry.source, &dest_final) {
        tracing::warn!(error = %e, path = %dest_final.display(), "failed to preserve metadata after copy");
    }

    match verify(request, full_mapping, &entry.relative, &entry.source, &dest_final) {
        Ok(true) => {
            report.record_copied(entry.relative.clone(), entry.size);
            store_checkpoint(checkpoint, &checkpoint_key, &dest_final, entry, true);
            ItemOutcome::Copied
        }
        Ok(false) => {
            report.record_discrepancy(entry.relative.clone(), "verification mismatch");
            store_checkpoint(checkpoint, &checkpoint_key, &dest_final, entry, false);
            ItemOutcome::Discrepancy
        }
        Err(e) => {
            report.record_discrepancy(entry.relative.clone(), format!("verification error: {e}"));
            store_checkpoint(checkpoint, &checkpoint_key, &dest_final, entry, false);
            ItemOutcome::Discrepancy
        }
    }
}

fn store_checkpoint(
    checkpoint: &Mutex<BTreeMap<String, FileCheckpoint>>,
    key: &str,
    dest_final: &Path,
    entry: &WalkEntry,
    verified: bool,
) {
    let mtime = entry
        .mtime
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let mut guard = checkpoint.lock().expect("checkpoint mutex poisoned");
    guard.insert(
        key.to_string(),
        FileCheckpoint {
            target_path: dest_final.to_path_buf(),
            size: entry.size,
            mtime,
            verified,
            timestamp: Utc::now(),
        },
    );
}

fn verify(
    request: &UserMigrationRequest,
    full_mapping: &PathMapping,
    relative: &Path,
    source: &Path,
    dest: &Path,
) -> Result<bool, MigrationError> {
    match request.integrity {
        IntegrityMethod::Size => Ok(checksums::compare_size(source, dest)),
        IntegrityMethod::Metadata => Ok(checksums::compare_metadata(source, dest)),
        IntegrityMethod::Hash => verify_hash(request, full_mapping, relative, source, dest),
    }
}

fn verify_hash(
    request: &UserMigrationRequest,
    full_mapping: &PathMapping,
    relative: &Path,
    source: &Path,
    dest: &Path,
) -> Result<bool, MigrationError> {
    if let Some(index) = &request.hash_index {
        for key in lookup_keys(request, full_mapping, relative) {
            if let Some(expected) = index.get(&key) {
                let actual = checksums::hash_file(dest, request.hash_algorithm)
                    .map_err(|e| e.with_context("path", dest.display().to_string()))?;
                return Ok(actual.eq_ignore_ascii_case(expected));
            }
        }
    }

    let expected = checksums::hash_file(source, request.hash_algorithm)
        .map_err(|e| e.with_context("path", source.display().to_string()))?;
    checksums::verify_with_retry(dest, &expected, request.hash_algorithm, request.retries, request.retry_delay)
}

fn lookup_keys(request: &UserMigrationRequest, full_mapping: &PathMapping, relative: &Path) -> Vec<String> {
    let relative_str = relative.to_string_lossy().to_string();
    let base = request.target_home.to_string_lossy().to_string();
    let mut keys = vec![pathmap::translate(
        &relative_str,
        full_mapping,
        &TranslateOptions { base: Some(&base), apply_base: true, network_prefix: None },
    )];
    keys.extend(checksums::generate_path_variants(&relative_str, Some(&request.username)));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::UserMigrationRequest;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn request(source_dir: PathBuf, target_home: PathBuf) -> UserMigrationRequest {
        UserMigrationRequest {
            username: "alice.example".to_string(),
            source_dir,
            target_home,
            exclude_dirs: vec![],
            exclude_file_globs: vec![],
            integrity: IntegrityMethod::Size,
            hash_algorithm: checksums::HashAlgorithm::Sha256,
            retries: 1,
            retry_delay: std::time::Duration::from_millis(1),
            hash_index: None,
            domain_suffix_map: BTreeMap::new(),
            skel_dir: PathBuf::from("/etc/skel"),
            group_name: "domain users".to_string(),
        }
    }

    #[test]
    fn copies_and_verifies_every_file_by_size() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("Documents")).unwrap();
        std::fs::write(src.path().join("Documents/report.docx"), b"hello world").unwrap();

        let req = request(src.path().to_path_buf(), dst.path().to_path_buf());
        let mapping = PathMapping::default_astra();
        let checkpoint = Mutex::new(BTreeMap::new());
        let report = ReportAccumulator::new("alice@default");

        let outcome = run_phase_a(&req, &mapping, &checkpoint, &report).unwrap();
        assert!(!outcome.any_copy_failed);
        assert!(!outcome.any_discrepancy);
        assert!(dst.path().join("Documents/report.docx").exists());
        assert_eq!(report.snapshot().copied.len(), 1);
    }

    #[test]
    fn browser_data_is_redirected_during_phase_a() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("BrowserData/chrome/Default")).unwrap();
        std::fs::write(src.path().join("BrowserData/chrome/Default/Bookmarks"), b"{}").unwrap();

        let req = request(src.path().to_path_buf(), dst.path().to_path_buf());
        let mapping = PathMapping::default_astra();
        let checkpoint = Mutex::new(BTreeMap::new());
        let report = ReportAccumulator::new("alice@default");

        run_phase_a(&req, &mapping, &checkpoint, &report).unwrap();
        assert!(dst.path().join(".config/google-chrome/Default/Default/Bookmarks").exists());
    }

    #[test]
    fn folder_renames_are_deferred_and_not_applied_in_phase_a() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("Documents")).unwrap();
        std::fs::write(src.path().join("Documents/a.txt"), b"a").unwrap();

        let req = request(src.path().to_path_buf(), dst.path().to_path_buf());
        let mapping = PathMapping::default_astra();
        let checkpoint = Mutex::new(BTreeMap::new());
        let report = ReportAccumulator::new("alice@default");

        run_phase_a(&req, &mapping, &checkpoint, &report).unwrap();
        assert!(dst.path().join("Documents/a.txt").exists());
        assert!(!dst.path().join("Документы").exists());
    }

    #[test]
    fn an_up_to_date_destination_is_skipped_not_recopied() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), b"source").unwrap();
        std::fs::write(dst.path().join("a.txt"), b"already-there").unwrap();
        let now = filetime::FileTime::now();
        let later = filetime::FileTime::from_unix_time(now.unix_seconds() + 100, 0);
        filetime::set_file_mtime(src.path().join("a.txt"), now).unwrap();
        filetime::set_file_mtime(dst.path().join("a.txt"), later).unwrap();

        let req = request(src.path().to_path_buf(), dst.path().to_path_buf());
        let mapping = PathMapping::default_astra();
        let checkpoint = Mutex::new(BTreeMap::new());
        let report = ReportAccumulator::new("alice@default");

        run_phase_a(&req, &mapping, &checkpoint, &report).unwrap();
        assert_eq!(std::fs::read(dst.path().join("a.txt")).unwrap(), b"already-there");
        assert_eq!(report.snapshot().skipped.len(), 1);
    }

    #[test]
    fn a_missing_source_directory_is_a_typed_error_before_any_work_starts() {
        let dst = tempdir().unwrap();
        let req = request(PathBuf::from("/does/not/exist"), dst.path().to_path_buf());
        let mapping = PathMapping::default_astra();
        let checkpoint = Mutex::new(BTreeMap::new());
        let report = ReportAccumulator::new("alice@default");
        assert!(run_phase_a(&req, &mapping, &checkpoint, &report).is_err());
        let _ = Arc::new(());
    }
}
