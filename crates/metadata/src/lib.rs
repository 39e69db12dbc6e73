#![deny(missing_docs)]

//! # Overview
//!
//! Metadata comparison and preservation helpers used by the copy worker:
//! deciding whether an existing destination can be skipped, and restoring
//! mtime/mode on the destination after a successful copy.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use errors::{MigrationError, COPY_003};
use filetime::FileTime;

/// Returns `true` when `dest` exists and its mtime is greater than or equal
/// to `source`'s, meaning the copy for this file can be skipped.
#[must_use]
pub fn destination_is_up_to_date(source: &Path, dest: &Path) -> bool {
    let (Ok(src_meta), Ok(dst_meta)) = (fs::metadata(source), fs::metadata(dest)) else {
        return false;
    };
    let (Ok(src_mtime), Ok(dst_mtime)) = (src_meta.modified(), dst_meta.modified()) else {
        return false;
    };
    dst_mtime >= src_mtime
}

/// Copies mtime (to the second) and Unix permission bits from `source` onto
/// `dest`. Best-effort: failures are reported as a `COPY_003` warning rather
/// than aborting the copy, since the file content has already landed safely.
pub fn preserve_metadata(source: &Path, dest: &Path) -> Result<(), MigrationError> {
    let src_meta = fs::metadata(source).map_err(|e| {
        MigrationError::new(COPY_003, format!("failed to stat source {}", source.display()))
            .with_cause(&e)
    })?;

    let mtime = src_meta
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let file_time = FileTime::from_system_time(mtime);
    filetime::set_file_mtime(dest, file_time).map_err(|e| {
        MigrationError::new(COPY_003, format!("failed to set mtime on {}", dest.display())).with_cause(&e)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(src_meta.permissions().mode());
        fs::set_permissions(dest, perms).map_err(|e| {
            MigrationError::new(COPY_003, format!("failed to set mode on {}", dest.display()))
                .with_cause(&e)
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn destination_older_than_source_is_not_up_to_date() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&source, b"a").unwrap();
        std::fs::write(&dest, b"a").unwrap();

        let now = FileTime::now();
        let later = FileTime::from_unix_time(now.unix_seconds() + 10, 0);
        filetime::set_file_mtime(&source, later).unwrap();
        filetime::set_file_mtime(&dest, now).unwrap();

        assert!(!destination_is_up_to_date(&source, &dest));
    }

    #[test]
    fn destination_newer_than_source_is_up_to_date() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&source, b"a").unwrap();
        std::fs::write(&dest, b"a").unwrap();

        let now = FileTime::now();
        let later = FileTime::from_unix_time(now.unix_seconds() + 10, 0);
        filetime::set_file_mtime(&source, now).unwrap();
        filetime::set_file_mtime(&dest, later).unwrap();

        assert!(destination_is_up_to_date(&source, &dest));
    }

    #[test]
    fn preserve_metadata_copies_mtime_to_the_second() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&source, b"a").unwrap();
        std::fs::write(&dest, b"different content length").unwrap();

        let target_time = FileTime::from_unix_time(1_700_000_000, 0);
        filetime::set_file_mtime(&source, target_time).unwrap();

        preserve_metadata(&source, &dest).unwrap();

        let dest_meta = std::fs::metadata(&dest).unwrap();
        let dest_mtime = FileTime::from_last_modification_time(&dest_meta);
        assert_eq!(dest_mtime.unix_seconds(), target_time.unix_seconds());
    }

    #[test]
    fn missing_source_produces_a_typed_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("missing.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&dest, b"x").unwrap();
        let _ = Duration::from_secs(0);
        assert!(preserve_metadata(&source, &dest).is_err());
    }
}
