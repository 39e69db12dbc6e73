#![deny(missing_docs)]

//! # Overview
//!
//! Exclude rules consulted by the source walker: a list of directory names
//! (matched by relative path) to prune entirely, and a list of glob patterns
//! matched against file paths.

use std::path::Path;

use errors::{MigrationError, CONFIG_001};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compiled exclude rules for one migration run.
pub struct ExcludeRules {
    exclude_dirs: Vec<String>,
    file_globs: GlobSet,
}

impl ExcludeRules {
    /// Compiles the configured exclude-dir names and exclude-file glob
    /// patterns. Invalid glob syntax surfaces as `CONFIG_001`.
    pub fn compile(exclude_dirs: &[String], exclude_file_globs: &[String]) -> Result<Self, MigrationError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_file_globs {
            let glob = Glob::new(pattern).map_err(|e| {
                MigrationError::new(CONFIG_001, format!("invalid exclude glob '{pattern}'")).with_cause(&e)
            })?;
            builder.add(glob);
        }
        let file_globs = builder.build().map_err(|e| {
            MigrationError::new(CONFIG_001, "failed to compile exclude-file glob set").with_cause(&e)
        })?;

        Ok(Self {
            exclude_dirs: exclude_dirs.to_vec(),
            file_globs,
        })
    }

    /// Whether the directory at `relative_path` (relative to the per-user
    /// source root) should be pruned from the walk.
    #[must_use]
    pub fn excludes_dir(&self, relative_path: &Path) -> bool {
        relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.exclude_dirs.iter().any(|excluded| excluded == name))
    }

    /// Whether `relative_path` is a dotfile (any path component starting
    /// with `.`). Dotfiles are excluded unconditionally, independent of
    /// configuration.
    #[must_use]
    pub fn is_dotfile(relative_path: &Path) -> bool {
        relative_path
            .components()
            .any(|c| c.as_os_str().to_str().is_some_and(|s| s.starts_with('.')))
    }

    /// Whether `relative_path` matches one of the configured exclude-file globs.
    #[must_use]
    pub fn excludes_file(&self, relative_path: &Path) -> bool {
        self.file_globs.is_match(relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_configured_directory_names() {
        let rules = ExcludeRules::compile(&["node_modules".to_string()], &[]).unwrap();
        assert!(rules.excludes_dir(Path::new("project/node_modules")));
        assert!(!rules.excludes_dir(Path::new("project/src")));
    }

    #[test]
    fn dotfiles_are_excluded_unconditionally() {
        assert!(ExcludeRules::is_dotfile(Path::new("alice/.cache/x")));
        assert!(!ExcludeRules::is_dotfile(Path::new("alice/Documents/x")));
    }

    #[test]
    fn glob_patterns_match_file_paths() {
        let rules = ExcludeRules::compile(&[], &["*.tmp".to_string()]).unwrap();
        assert!(rules.excludes_file(Path::new("Documents/scratch.tmp")));
        assert!(!rules.excludes_file(Path::new("Documents/report.docx")));
    }

    #[test]
    fn invalid_glob_is_a_typed_config_error() {
        let result = ExcludeRules::compile(&[], &["[".to_string()]);
        assert!(result.is_err());
    }
}
