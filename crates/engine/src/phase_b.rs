//! Phase B: directory renames deferred from phase A. Runs only after every
//! phase A item has been copied and verified (or explicitly skipped).

use std::path::{Path, PathBuf};

use errors::{MigrationError, TARGET_002};
use pathmap::PathMapping;
use reporting::ReportAccumulator;

/// Applies `desktop_rename` first, then `folder_mapping`, as required by the
/// fixed rename order.
pub(crate) fn run_phase_b(
    target_home: &Path,
    mapping: &PathMapping,
    report: &ReportAccumulator,
) -> Result<(), MigrationError> {
    for (old, new) in &mapping.desktop_rename {
        rename_one(target_home, old, &new.join("/"), report)?;
    }
    for (old, new) in &mapping.folder_mapping {
        rename_one(target_home, old, new, report)?;
    }
    Ok(())
}

fn rename_one(target_home: &Path, old_rel: &str, new_rel: &str, report: &ReportAccumulator) -> Result<(), MigrationError> {
    let old = target_home.join(old_rel);
    let new = target_home.join(new_rel);

    if !old.exists() {
        return Ok(());
    }

    if !new.exists() {
        if let Some(parent) = new.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MigrationError::new(TARGET_002, format!("failed to create parent of {}", new.display())).with_cause(&e)
            })?;
        }
        std::fs::rename(&old, &new).map_err(|e| {
            MigrationError::new(TARGET_002, format!("failed to rename {} to {}", old.display(), new.display()))
                .with_cause(&e)
        })?;
        report.record_rename(old_rel, new_rel);
        return Ok(());
    }

    merge_directories(&old, &new)?;
    report.record_rename(old_rel, new_rel);
    Ok(())
}

/// Both `old` and `new` exist: move every child of `old` into `new`, then
/// remove `old` if it ended up empty.
fn merge_directories(old: &Path, new: &Path) -> Result<(), MigrationError> {
    let read_dir = std::fs::read_dir(old).map_err(|e| {
        MigrationError::new(TARGET_002, format!("failed to read {}", old.display())).with_cause(&e)
    })?;

    for child in read_dir {
        let child = child.map_err(|e| {
            MigrationError::new(TARGET_002, format!("failed to read entry under {}", old.display())).with_cause(&e)
        })?;
        let dest: PathBuf = new.join(child.file_name());
        std::fs::rename(child.path(), &dest).map_err(|e| {
            MigrationError::new(TARGET_002, format!("failed to move {} into {}", child.path().display(), new.display()))
                .with_cause(&e)
        })?;
    }

    let _ = std::fs::remove_dir(old);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn desktop_rename_expands_into_two_segments() {
        let home = tempdir().unwrap();
        std::fs::create_dir_all(home.path().join("Desktop")).unwrap();
        std::fs::write(home.path().join("Desktop/shortcut.lnk"), b"x").unwrap();

        let mapping = PathMapping::default_astra();
        let report = ReportAccumulator::new("alice@default");
        run_phase_b(home.path(), &mapping, &report).unwrap();

        assert!(home.path().join("Desktops/Desktop1/shortcut.lnk").exists());
        assert!(!home.path().join("Desktop").exists());
    }

    #[test]
    fn folder_mapping_renames_top_level_localized_name() {
        let home = tempdir().unwrap();
        std::fs::create_dir_all(home.path().join("Documents")).unwrap();
        std::fs::write(home.path().join("Documents/a.txt"), b"a").unwrap();

        let mapping = PathMapping::default_astra();
        let report = ReportAccumulator::new("alice@default");
        run_phase_b(home.path(), &mapping, &report).unwrap();

        assert!(home.path().join("Документы/a.txt").exists());
    }

    #[test]
    fn when_both_old_and_new_exist_children_are_merged_and_old_removed() {
        let home = tempdir().unwrap();
        std::fs::create_dir_all(home.path().join("Documents")).unwrap();
        std::fs::create_dir_all(home.path().join("Документы")).unwrap();
        std::fs::write(home.path().join("Documents/a.txt"), b"a").unwrap();
        std::fs::write(home.path().join("Документы/existing.txt"), b"pre-existing").unwrap();

        let mapping = PathMapping::default_astra();
        let report = ReportAccumulator::new("alice@default");
        run_phase_b(home.path(), &mapping, &report).unwrap();

        assert!(home.path().join("Документы/a.txt").exists());
        assert!(home.path().join("Документы/existing.txt").exists());
        assert!(!home.path().join("Documents").exists());
    }

    #[test]
    fn a_missing_source_directory_is_a_silent_no_op() {
        let home = tempdir().unwrap();
        let mapping = PathMapping::default_astra();
        let report = ReportAccumulator::new("alice@default");
        run_phase_b(home.path(), &mapping, &report).unwrap();
        assert_eq!(report.snapshot().renames.len(), 0);
    }
}
