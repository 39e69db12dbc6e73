#![deny(missing_docs)]

//! # Overview
//!
//! The per-user migration engine (C5): a two-phase pipeline that copies and
//! verifies one user's files preserving source structure (phase A), renames
//! the deferred special-folder directories (phase B), and then normalizes
//! the target home's ownership and default dotfiles (phase C, supplemental).
//!
//! [`migrate_user`] is the single public entry point. It is resumable: given
//! a non-empty checkpoint from a prior, interrupted run, it infers how much
//! work remains and skips phases that already completed.

mod phase_a;
mod phase_b;
mod request;
mod resume;
mod structure;

use std::collections::BTreeMap;
use std::sync::Mutex;

use errors::MigrationError;
use journal::FileCheckpoint;
use pathmap::PathMapping;
use reporting::ReportAccumulator;

pub use request::{IntegrityMethod, UserMigrationRequest, UserOutcome};
pub use structure::{chown_recursive, copy_skel, format_username_for_linux};

/// Runs (or resumes) one user's migration.
///
/// `checkpoint` is the per-user resumable state, loaded by the caller from
/// the journal before this call and persisted again afterward; this function
/// only mutates it in memory. `report` accumulates copy/skip/discrepancy/rename
/// events for the run's on-disk report.
pub fn migrate_user(
    request: &UserMigrationRequest,
    checkpoint: &mut BTreeMap<String, FileCheckpoint>,
    report: &ReportAccumulator,
) -> Result<UserOutcome, MigrationError> {
    let mapping = PathMapping::default_astra();

    if !checkpoint.is_empty() && resume::phase_b_evidence_present(&request.target_home, &mapping) {
        return Ok(UserOutcome::AlreadyComplete);
    }

    let phase_a_already_done = !checkpoint.is_empty() && checkpoint.values().any(|c| c.verified);

    let outcome = if phase_a_already_done {
        run_phase_b_and_c(request, &mapping, report)?
    } else {
        let checkpoint_mutex = Mutex::new(std::mem::take(checkpoint));
        let phase_a_outcome = phase_a::run_phase_a(request, &mapping, &checkpoint_mutex, report)?;
        *checkpoint = checkpoint_mutex.into_inner().expect("checkpoint mutex poisoned");

        if phase_a_outcome.any_copy_failed {
            return Ok(UserOutcome::Failed);
        }

        let tail_outcome = run_phase_b_and_c(request, &mapping, report)?;
        if phase_a_outcome.any_discrepancy || tail_outcome == UserOutcome::CompletedWithError {
            UserOutcome::CompletedWithError
        } else {
            tail_outcome
        }
    };

    Ok(outcome)
}

/// Renames are deferred from phase A so they never race with in-flight
/// copies. A rename failure here downgrades the user's outcome to
/// [`UserOutcome::CompletedWithError`] rather than failing the whole run:
/// every file is already on disk, only its final resting place is off.
fn run_phase_b_and_c(
    request: &UserMigrationRequest,
    mapping: &PathMapping,
    report: &ReportAccumulator,
) -> Result<UserOutcome, MigrationError> {
    let phase_b_failed = match phase_b::run_phase_b(&request.target_home, mapping, report) {
        Ok(()) => false,
        Err(e) => {
            tracing::warn!(error = %e, home = %request.target_home.display(), "phase B rename failed");
            report.record_discrepancy(request.target_home.clone(), e.to_string());
            true
        }
    };
    run_phase_c(request);
    Ok(if phase_b_failed { UserOutcome::CompletedWithError } else { UserOutcome::Success })
}

/// Phase C failures never abort the user's run; each one is logged and would
/// be recorded into the journal's `last_error` by the orchestrator.
fn run_phase_c(request: &UserMigrationRequest) {
    let linux_username = match format_username_for_linux(&request.username, &request.domain_suffix_map) {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(error = %e, username = %request.username, "failed to format username in phase C");
            return;
        }
    };

    if let Err(e) = copy_skel(&request.skel_dir, &request.target_home) {
        tracing::warn!(error = %e, home = %request.target_home.display(), "failed to populate home from skeleton");
    }

    #[cfg(unix)]
    if let Err(e) = chown_recursive(&request.target_home, &linux_username, &request.group_name) {
        tracing::warn!(error = %e, user = %linux_username, group = %request.group_name, "failed to chown target home");
    }
    #[cfg(not(unix))]
    let _ = linux_username;
}
