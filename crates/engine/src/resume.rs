//! Resume-state detection: how far a prior, interrupted run got.

use std::path::Path;

use pathmap::PathMapping;

/// Whether `target_home` already shows evidence that phase B ran: any
/// `desktop_rename` destination or localized `folder_mapping` destination
/// exists.
#[must_use]
pub(crate) fn phase_b_evidence_present(target_home: &Path, mapping: &PathMapping) -> bool {
    let desktop_done = mapping.desktop_rename.values().any(|segments| target_home.join(segments.join("/")).exists());
    if desktop_done {
        return true;
    }
    mapping.folder_mapping.values().any(|localized| target_home.join(localized).exists())
}
