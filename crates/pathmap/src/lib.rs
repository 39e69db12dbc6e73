#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! Pure, deterministic translation of a Windows-style source-relative path
//! into its Linux target-relative counterpart. Nothing in this crate touches
//! the filesystem: every function is a string-in, string-out transformation
//! so it can be exhaustively property-tested and so the migration engine can
//! compute destination paths ahead of any I/O.
//!
//! # Design
//!
//! [`PathMapping`] holds the three static substitution tables described by
//! the data model: `folder_mapping` (localized top-level folder names),
//! `desktop_rename` (a folder that expands into two segments), and
//! `browser_redirect` (per-browser profile roots that replace a
//! `BrowserData/<browser>/...` prefix). [`translate`] applies them in the
//! fixed order: backslash normalization, network-prefix stripping, leading-slash
//! stripping, per-segment desktop/folder substitution, then browser redirection,
//! then optional base-path join.
//!
//! # Invariants
//!
//! - `translate` never reads or writes the filesystem.
//! - For a given `(path, options)` pair the output is always identical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Static, read-only path-substitution tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathMapping {
    /// Top-level folder renames, e.g. `"Documents" -> "Документы"`.
    pub folder_mapping: BTreeMap<String, String>,
    /// Folders that expand into more than one destination segment, e.g.
    /// `"Desktop" -> ["Desktops", "Desktop1"]`.
    pub desktop_rename: BTreeMap<String, Vec<String>>,
    /// Per-browser profile root (relative to the user's home) that a
    /// `BrowserData/<browser>/...` prefix is replaced with.
    pub browser_redirect: BTreeMap<String, Vec<String>>,
}

impl PathMapping {
    /// The mapping used throughout the migration: Documents/Downloads/Pictures
    /// localized, Desktop expanded, and chrome/yandex browser data redirected
    /// into their usual Linux profile locations.
    #[must_use]
    pub fn default_astra() -> Self {
        let mut folder_mapping = BTreeMap::new();
        folder_mapping.insert("Documents".to_string(), "Документы".to_string());
        folder_mapping.insert("Downloads".to_string(), "Загрузки".to_string());
        folder_mapping.insert("Pictures".to_string(), "Изображения".to_string());

        let mut desktop_rename = BTreeMap::new();
        desktop_rename.insert(
            "Desktop".to_string(),
            vec!["Desktops".to_string(), "Desktop1".to_string()],
        );

        let mut browser_redirect = BTreeMap::new();
        browser_redirect.insert(
            "chrome".to_string(),
            vec![".config".to_string(), "google-chrome".to_string(), "Default".to_string()],
        );
        browser_redirect.insert(
            "yandex".to_string(),
            vec![".config".to_string(), "yandex-browser".to_string(), "Default".to_string()],
        );

        Self {
            folder_mapping,
            desktop_rename,
            browser_redirect,
        }
    }
}

/// Options controlling a single [`translate`] call.
#[derive(Debug, Clone, Default)]
pub struct TranslateOptions<'a> {
    /// Network share prefix to strip when present, e.g. `"\\\\fileserver\\share"`.
    pub network_prefix: Option<&'a str>,
    /// Base directory to prepend to the translated path.
    pub base: Option<&'a str>,
    /// Whether to prepend `base` to the result.
    pub apply_base: bool,
}

/// Translates a single Windows-style path into its Linux-relative (or,
/// if `apply_base` is set, absolute) counterpart per the fixed rule order.
#[must_use]
pub fn translate(path: &str, mapping: &PathMapping, options: &TranslateOptions<'_>) -> String {
    let mut work = path.replace('\\', "/");

    if let Some(prefix) = options.network_prefix {
        let normalized_prefix = prefix.replace('\\', "/");
        if !normalized_prefix.is_empty() && work.starts_with(&normalized_prefix) {
            work = work[normalized_prefix.len()..].to_string();
        }
    }

    let stripped = work.strip_prefix('/').unwrap_or(&work);

    let segments: Vec<&str> = stripped.split('/').filter(|s| !s.is_empty()).collect();

    let mut translated: Vec<String> = Vec::with_capacity(segments.len());
    for segment in &segments {
        if let Some(expansion) = mapping.desktop_rename.get(*segment) {
            translated.extend(expansion.iter().cloned());
        } else if let Some(renamed) = mapping.folder_mapping.get(*segment) {
            translated.push(renamed.clone());
        } else {
            translated.push((*segment).to_string());
        }
    }

    let translated = apply_browser_redirect(&segments, translated, mapping);

    if options.apply_base {
        if let Some(base) = options.base {
            let base = base.trim_end_matches('/');
            if translated.is_empty() {
                return base.to_string();
            }
            return format!("{base}/{}", translated.join("/"));
        }
    }

    translated.join("/")
}

/// `BrowserData/<browser>/...` is matched against the *original* (untranslated)
/// segment sequence, because `BrowserData` never appears in `folder_mapping`
/// or `desktop_rename` and matching post-substitution would be equivalent but
/// more confusing to read at the call site.
fn apply_browser_redirect(
    original_segments: &[&str],
    translated: Vec<String>,
    mapping: &PathMapping,
) -> Vec<String> {
    if original_segments.len() < 2 || original_segments[0] != "BrowserData" {
        return translated;
    }
    let browser = original_segments[1];
    let Some(profile_root) = mapping.browser_redirect.get(browser) else {
        return translated;
    };

    let mut out = profile_root.clone();
    out.extend(original_segments[2..].iter().map(|s| (*s).to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> PathMapping {
        PathMapping::default_astra()
    }

    #[test]
    fn backslashes_are_normalized_to_forward_slashes() {
        let out = translate(
            r"Documents\reports\q1.xlsx",
            &mapping(),
            &TranslateOptions::default(),
        );
        assert_eq!(out, "Документы/reports/q1.xlsx");
    }

    #[test]
    fn network_prefix_is_stripped_when_present() {
        let opts = TranslateOptions {
            network_prefix: Some(r"\\fileserver\share"),
            ..Default::default()
        };
        let out = translate(r"\\fileserver\share\alice\Downloads\x.dat", &mapping(), &opts);
        assert_eq!(out, "alice/Загрузки/x.dat");
    }

    #[test]
    fn desktop_expands_to_two_segments() {
        let out = translate("Desktop/shortcut.lnk", &mapping(), &TranslateOptions::default());
        assert_eq!(out, "Desktops/Desktop1/shortcut.lnk");
    }

    #[test]
    fn unmapped_segments_pass_through_unchanged() {
        let out = translate("Music/song.mp3", &mapping(), &TranslateOptions::default());
        assert_eq!(out, "Music/song.mp3");
    }

    #[test]
    fn chrome_browser_data_redirects_into_config_profile() {
        let out = translate(
            "BrowserData/chrome/Default/Bookmarks",
            &mapping(),
            &TranslateOptions::default(),
        );
        assert_eq!(out, ".config/google-chrome/Default/Default/Bookmarks");
    }

    #[test]
    fn yandex_browser_data_redirects_into_config_profile() {
        let out = translate(
            "BrowserData/yandex/profile.dat",
            &mapping(),
            &TranslateOptions::default(),
        );
        assert_eq!(out, ".config/yandex-browser/Default/profile.dat");
    }

    #[test]
    fn unknown_browser_name_is_left_untranslated() {
        let out = translate(
            "BrowserData/opera/profile.dat",
            &mapping(),
            &TranslateOptions::default(),
        );
        assert_eq!(out, "BrowserData/opera/profile.dat");
    }

    #[test]
    fn apply_base_prepends_and_normalizes() {
        let opts = TranslateOptions {
            base: Some("/home/alice@default/"),
            apply_base: true,
            ..Default::default()
        };
        let out = translate("Documents/a.txt", &mapping(), &opts);
        assert_eq!(out, "/home/alice@default/Документы/a.txt");
    }

    #[test]
    fn leading_slash_is_stripped_exactly_once() {
        let out = translate("/Documents/a.txt", &mapping(), &TranslateOptions::default());
        assert_eq!(out, "Документы/a.txt");
    }

    #[test]
    fn translation_is_pure_and_repeatable() {
        let a = translate(r"Desktop\x.txt", &mapping(), &TranslateOptions::default());
        let b = translate(r"Desktop\x.txt", &mapping(), &TranslateOptions::default());
        assert_eq!(a, b);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_.]{1,12}"
    }

    fn windows_path() -> impl Strategy<Value = String> {
        proptest::collection::vec(segment(), 1..6).prop_map(|segs| segs.join("\\"))
    }

    proptest! {
        #[test]
        fn translate_is_deterministic_for_any_path(path in windows_path()) {
            let mapping = PathMapping::default_astra();
            let opts = TranslateOptions::default();
            prop_assert_eq!(translate(&path, &mapping, &opts), translate(&path, &mapping, &opts));
        }

        #[test]
        fn translate_output_never_contains_a_backslash(path in windows_path()) {
            let mapping = PathMapping::default_astra();
            let out = translate(&path, &mapping, &TranslateOptions::default());
            prop_assert!(!out.contains('\\'));
        }

        #[test]
        fn segments_with_no_special_name_pass_through_one_for_one(
            segs in proptest::collection::vec(
                "[a-zA-Z0-9_]{1,8}".prop_filter("must not collide with a mapped name", |s| {
                    !matches!(s.as_str(), "Documents" | "Downloads" | "Pictures" | "Desktop" | "BrowserData")
                }),
                1..6,
            )
        ) {
            let mapping = PathMapping::default_astra();
            let path = segs.join("/");
            let out = translate(&path, &mapping, &TranslateOptions::default());
            prop_assert_eq!(out.split('/').count(), segs.len());
        }
    }
}
