//! Hash-index loading: reads a pre-populated `(path, hash)` table and builds
//! an in-memory lookup tolerant of the several ways a path can be spelled.
//!
//! Grounded in the original tool's `load_hashes_from_db`/`generate_path_variants`:
//! the index is a flat SQLite table, and because the indexed paths and the
//! paths discovered while walking the source tree rarely agree on exact
//! spelling (leading slashes, backslash vs. forward slash, a username
//! prefix), each row contributes several candidate keys rather than one.

use std::collections::HashMap;
use std::path::Path;

use errors::{MigrationError, VERIFY_002};
use pathmap::PathMapping;

/// Loads a hash index from a SQLite database at `db_path`, table
/// `file_hashes(path, hash)`. `username_or_netprefix`, when present, is used
/// to generate username-prefixed variant keys. Paths are also translated
/// through [`pathmap::translate`] using `mapping` and `base` to produce a
/// canonical variant. Earlier-written keys win on collision.
pub fn load_hash_index(
    db_path: &Path,
    mapping: &PathMapping,
    base: &str,
    username_or_netprefix: Option<&str>,
) -> Result<HashMap<String, String>, MigrationError> {
    let conn = rusqlite::Connection::open(db_path).map_err(|e| {
        MigrationError::new(VERIFY_002, format!("failed to open hash index {}", db_path.display()))
            .with_cause(&e)
    })?;

    let mut stmt = conn
        .prepare("SELECT path, hash FROM file_hashes")
        .map_err(|e| {
            MigrationError::new(VERIFY_002, "failed to prepare hash index query").with_cause(&e)
        })?;

    let rows = stmt
        .query_map([], |row| {
            let path: String = row.get(0)?;
            let hash: String = row.get(1)?;
            Ok((path, hash))
        })
        .map_err(|e| MigrationError::new(VERIFY_002, "failed to query hash index").with_cause(&e))?;

    let mut index = HashMap::new();
    for row in rows {
        let (path, hash) = row
            .map_err(|e| MigrationError::new(VERIFY_002, "failed to read hash index row").with_cause(&e))?;

        let translated = pathmap::translate(
            &path,
            mapping,
            &pathmap::TranslateOptions {
                base: Some(base),
                apply_base: true,
                network_prefix: None,
            },
        );
        index.entry(translated).or_insert_with(|| hash.clone());

        for variant in generate_path_variants(&path, username_or_netprefix) {
            index.entry(variant).or_insert_with(|| hash.clone());
        }
    }

    Ok(index)
}

/// Generates alternative lookup keys for a single indexed path, in priority
/// order (earlier entries should be preferred by callers that dedup):
/// the raw path, its forward-slash form, a Desktop-stripped form, a
/// username-prefixed form, and finally a bare-basename fallback gated on the
/// basename being long or containing a separator, to avoid collisions between
/// unrelated short names.
#[must_use]
pub fn generate_path_variants(path: &str, username: Option<&str>) -> Vec<String> {
    let mut variants = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut push = |v: String, variants: &mut Vec<String>, seen: &mut std::collections::HashSet<String>| {
        if seen.insert(v.clone()) {
            variants.push(v);
        }
    };

    push(path.to_string(), &mut variants, &mut seen);

    let forward = path.replace('\\', "/");
    push(forward.clone(), &mut variants, &mut seen);

    let desktop_stripped = forward
        .strip_prefix("Desktop/")
        .or_else(|| forward.strip_prefix("/Desktop/"));
    if let Some(rest) = desktop_stripped {
        push(rest.to_string(), &mut variants, &mut seen);
        if let Some(user) = username {
            push(format!("{user}/{rest}"), &mut variants, &mut seen);
        }
    }

    if let Some(user) = username {
        push(format!("{user}/{forward}"), &mut variants, &mut seen);
        push(format!("{user}\\{path}"), &mut variants, &mut seen);
    }

    if let Some(basename) = forward.rsplit('/').next() {
        let long_or_separated = basename.len() > 10 || basename.contains('_') || basename.contains('-');
        if long_or_separated {
            push(basename.to_string(), &mut variants, &mut seen);
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_and_forward_slash_variants_are_both_present() {
        let variants = generate_path_variants(r"alice\Documents\a.txt", None);
        assert!(variants.contains(&r"alice\Documents\a.txt".to_string()));
        assert!(variants.contains(&"alice/Documents/a.txt".to_string()));
    }

    #[test]
    fn desktop_prefix_is_stripped_and_username_prefixed() {
        let variants = generate_path_variants("Desktop/shortcut.lnk", Some("alice"));
        assert!(variants.contains(&"shortcut.lnk".to_string()));
        assert!(variants.contains(&"alice/shortcut.lnk".to_string()));
    }

    #[test]
    fn bare_basename_fallback_only_added_for_long_or_separated_names() {
        let with_underscore = generate_path_variants("Documents/final_report.docx", None);
        assert!(with_underscore.contains(&"final_report.docx".to_string()));

        let short_plain = generate_path_variants("Documents/a.txt", None);
        assert!(!short_plain.contains(&"a.txt".to_string()));
    }

    #[test]
    fn variants_are_deduplicated() {
        let variants = generate_path_variants("a.txt", None);
        let unique: std::collections::HashSet<_> = variants.iter().collect();
        assert_eq!(unique.len(), variants.len());
    }
}
