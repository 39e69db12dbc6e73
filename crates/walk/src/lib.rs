#![deny(missing_docs)]

//! # Overview
//!
//! Breadth-first enumeration of a per-user source tree, pruning excluded
//! directories by relative path, skipping dotfiles unconditionally, and
//! applying exclude-file globs. Returns plain data — no sorting or dispatch —
//! so the engine's enumerate/sort/dispatch pipeline stages stay independent.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use errors::{MigrationError, SOURCE_001, SOURCE_002, SOURCE_003};
use filters::ExcludeRules;

/// One discovered source file.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Absolute source path.
    pub source: PathBuf,
    /// Path relative to the per-user source root.
    pub relative: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last-modified time.
    pub mtime: SystemTime,
}

/// Breadth-first walks `root`, returning every non-excluded, non-dotfile file.
/// Directory order within a level is the operating system's `read_dir` order;
/// sorting by mtime is the caller's responsibility (see the engine's
/// enumerate-then-sort pipeline stage).
pub fn walk(root: &Path, rules: &ExcludeRules) -> Result<Vec<WalkEntry>, MigrationError> {
    if !root.exists() {
        return Err(MigrationError::new(
            SOURCE_001,
            format!("source directory not found: {}", root.display()),
        ));
    }
    if !root.is_dir() {
        return Err(MigrationError::new(
            SOURCE_001,
            format!("source path is not a directory: {}", root.display()),
        ));
    }

    let mut entries = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(PathBuf::new());

    while let Some(relative_dir) = queue.pop_front() {
        let absolute_dir = root.join(&relative_dir);
        let read_dir = std::fs::read_dir(&absolute_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                MigrationError::new(
                    SOURCE_003,
                    format!("permission denied reading {}", absolute_dir.display()),
                )
                .with_cause(&e)
            } else {
                MigrationError::new(
                    SOURCE_002,
                    format!("failed to read directory {}", absolute_dir.display()),
                )
                .with_cause(&e)
            }
        })?;

        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|e| {
                MigrationError::new(SOURCE_002, "failed to read directory entry").with_cause(&e)
            })?;
            let file_type = dir_entry.file_type().map_err(|e| {
                MigrationError::new(SOURCE_002, "failed to stat directory entry").with_cause(&e)
            })?;
            let relative = relative_dir.join(dir_entry.file_name());

            if ExcludeRules::is_dotfile(&relative) {
                continue;
            }

            if file_type.is_dir() {
                if rules.excludes_dir(&relative) {
                    continue;
                }
                queue.push_back(relative);
                continue;
            }

            if !file_type.is_file() {
                continue;
            }
            if rules.excludes_file(&relative) {
                continue;
            }

            let metadata = dir_entry.metadata().map_err(|e| {
                MigrationError::new(SOURCE_002, format!("failed to stat {}", relative.display()))
                    .with_cause(&e)
            })?;
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

            entries.push(WalkEntry {
                source: root.join(&relative),
                relative,
                size: metadata.len(),
                mtime,
            });
        }
    }

    Ok(entries)
}
