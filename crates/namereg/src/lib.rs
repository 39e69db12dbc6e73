#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! Per-directory registry of reserved destination basenames. Enforces the
//! filesystem's 255-byte name limit and resolves collisions by truncating the
//! stem and appending an ordinal suffix, so two copier threads writing into
//! the same destination directory never race to the same final name.
//!
//! # Design
//!
//! [`NameRegistry`] holds one mutex-guarded `HashSet<String>` per directory.
//! [`NameRegistry::reserve`] is the only entry point: it returns the final
//! basename to use, plus a [`RenameEvent`] when the returned name differs
//! from the candidate, so callers can log the mapping for reporting.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Maximum basename length in bytes, matching common Linux filesystem limits.
pub const MAX_NAME_BYTES: usize = 255;

/// Records that a candidate basename had to be altered to become unique or
/// fit within [`MAX_NAME_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    /// The basename the caller originally asked to reserve.
    pub original: String,
    /// The basename that was actually reserved.
    pub final_name: String,
}

/// Mutex-guarded, per-directory set of reserved basenames.
#[derive(Default)]
pub struct NameRegistry {
    reserved: Mutex<HashMap<PathBuf, HashSet<String>>>,
}

impl NameRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a final, unique, byte-length-bounded basename for `candidate`
    /// within `dir`. Returns the final basename and, if it differs from
    /// `candidate`, the rename event to record.
    pub fn reserve(&self, dir: &Path, candidate: &str) -> (String, Option<RenameEvent>) {
        let mut guard = self.reserved.lock().expect("name registry mutex poisoned");
        let dir_set = guard.entry(dir.to_path_buf()).or_default();

        if candidate.len() <= MAX_NAME_BYTES && !dir_set.contains(candidate) {
            dir_set.insert(candidate.to_string());
            return (candidate.to_string(), None);
        }

        let (stem, ext) = split_extension(candidate);
        let mut ordinal: u32 = 0;
        loop {
            let suffix = if ordinal == 0 {
                String::new()
            } else {
                format!("_{ordinal}")
            };
            let reserved_len = suffix.len() + ext.len();
            let stem_budget = MAX_NAME_BYTES.saturating_sub(reserved_len);
            let truncated_stem = truncate_to_byte_budget(stem, stem_budget);
            let candidate_name = format!("{truncated_stem}{suffix}{ext}");

            if !dir_set.contains(&candidate_name) {
                dir_set.insert(candidate_name.clone());
                let event = RenameEvent {
                    original: candidate.to_string(),
                    final_name: candidate_name.clone(),
                };
                return (candidate_name, Some(event));
            }
            ordinal += 1;
        }
    }
}

/// Splits `name` into `(stem, extension)` where `extension` includes the
/// leading dot. A name with no `.`, or one that is entirely a leading dot
/// (e.g. `.bashrc`), has no extension split off.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) => (name, ""),
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

/// Truncates `s` to at most `budget` bytes without splitting a UTF-8 code point.
fn truncate_to_byte_budget(s: &str, budget: usize) -> &str {
    if s.len() <= budget {
        return s;
    }
    let mut end = budget;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn short_unique_name_is_reserved_unchanged() {
        let reg = NameRegistry::new();
        let (name, event) = reg.reserve(Path::new("/home/alice/Documents"), "report.docx");
        assert_eq!(name, "report.docx");
        assert!(event.is_none());
    }

    #[test]
    fn colliding_candidate_gets_an_ordinal_suffix() {
        let reg = NameRegistry::new();
        let dir = Path::new("/home/alice/Documents");
        let (first, _) = reg.reserve(dir, "report.docx");
        let (second, event) = reg.reserve(dir, "report.docx");
        assert_ne!(first, second);
        assert_eq!(second, "report_1.docx");
        assert_eq!(event.unwrap().final_name, "report_1.docx");
    }

    #[test]
    fn repeated_collisions_increment_the_ordinal() {
        let reg = NameRegistry::new();
        let dir = Path::new("/home/alice/Documents");
        reg.reserve(dir, "report.docx");
        reg.reserve(dir, "report.docx");
        let (third, _) = reg.reserve(dir, "report.docx");
        assert_eq!(third, "report_2.docx");
    }

    #[test]
    fn overlong_name_is_truncated_to_the_byte_budget() {
        let reg = NameRegistry::new();
        let dir = Path::new("/home/alice/Documents");
        let stem: String = std::iter::repeat('a').take(300).collect();
        let long_name = format!("{stem}.txt");
        let (name, event) = reg.reserve(dir, &long_name);
        assert!(name.len() <= MAX_NAME_BYTES);
        assert!(name.ends_with(".txt"));
        assert_eq!(event.unwrap().original, long_name);
    }

    #[test]
    fn two_overlong_siblings_differing_only_in_the_tail_get_distinct_names() {
        let reg = NameRegistry::new();
        let dir = Path::new("/home/alice/Documents");
        let prefix: String = std::iter::repeat('a').take(250).collect();
        let first_candidate = format!("{prefix}AAAAAAAAAA.txt");
        let second_candidate = format!("{prefix}BBBBBBBBBB.txt");

        let (first, _) = reg.reserve(dir, &first_candidate);
        let (second, _) = reg.reserve(dir, &second_candidate);

        assert_ne!(first, second);
        assert!(first.len() <= MAX_NAME_BYTES);
        assert!(second.len() <= MAX_NAME_BYTES);
    }

    #[test]
    fn registries_are_independent_per_directory() {
        let reg = NameRegistry::new();
        let (a, _) = reg.reserve(Path::new("/home/alice/Documents"), "a.txt");
        let (b, _) = reg.reserve(Path::new("/home/bob/Documents"), "a.txt");
        assert_eq!(a, "a.txt");
        assert_eq!(b, "a.txt");
    }

    #[test]
    fn dotfile_with_no_extension_is_treated_as_pure_stem() {
        let reg = NameRegistry::new();
        let dir = Path::new("/home/alice");
        let (first, _) = reg.reserve(dir, ".bashrc");
        let (second, _) = reg.reserve(dir, ".bashrc");
        assert_eq!(first, ".bashrc");
        assert_eq!(second, ".bashrc_1");
    }
}
