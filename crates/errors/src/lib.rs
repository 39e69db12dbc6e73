#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! Error taxonomy for the migration engine: enumerated codes grouped into
//! categories, each with a description, a recommended remediation, and a
//! default severity. Every fallible operation in the workspace ultimately
//! produces a [`MigrationError`], and the orchestrator turns the most recent
//! one into the journal's `last_error` field via [`ErrorRecord`].
//!
//! # Design
//!
//! [`ErrorCode`] is the static registry entry (code, category, description,
//! solution, severity). [`MigrationError`] pairs a code with a run-time
//! `details` string, a context map, and an optional cause. [`Severity`]
//! and [`ErrorCategory`] determine whether an error flips the global status
//! to `failed` (see [`MigrationError::is_fatal`]).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad grouping of error codes, mirroring the subsystem that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCategory {
    /// Process or environment initialization failures.
    Init,
    /// Configuration loading or validation failures.
    Config,
    /// Source mounting failures.
    Mount,
    /// Problems reading the source tree.
    Source,
    /// Problems writing the target tree.
    Target,
    /// File copy failures.
    Copy,
    /// Integrity verification failures.
    Verify,
    /// Username resolution or local-account failures.
    User,
    /// Network reachability failures.
    Network,
    /// Uncategorized system failures.
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::Config => "CONFIG",
            Self::Mount => "MOUNT",
            Self::Source => "SOURCE",
            Self::Target => "TARGET",
            Self::Copy => "COPY",
            Self::Verify => "VERIFY",
            Self::User => "USER",
            Self::Network => "NETWORK",
            Self::System => "SYSTEM",
        };
        f.write_str(s)
    }
}

/// Severity of an error record, independent of its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Recorded for visibility; does not change run outcome by itself.
    Warning,
    /// Recorded and affects the current user's or phase's outcome.
    Error,
    /// Always transitions the global status to `failed`.
    Critical,
}

/// Static registry entry: one per error code.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode {
    /// Stable identifier, e.g. `"MOUNT_001"`.
    pub code: &'static str,
    /// Category the code belongs to.
    pub category: ErrorCategory,
    /// Human-readable description of the failure.
    pub description: &'static str,
    /// Recommended operator remediation.
    pub solution: &'static str,
    /// Default severity when this code is raised without an override.
    pub severity: Severity,
}

impl ErrorCode {
    /// A category is CRITICAL-by-association for {INIT, CONFIG, MOUNT, SOURCE}: any
    /// error in one of these categories fails the whole run regardless of its own
    /// severity field.
    #[must_use]
    pub fn always_fatal_category(category: ErrorCategory) -> bool {
        matches!(
            category,
            ErrorCategory::Init | ErrorCategory::Config | ErrorCategory::Mount | ErrorCategory::Source
        )
    }
}

macro_rules! error_codes {
    ($($const_name:ident => { code: $code:literal, category: $category:expr, description: $description:literal, solution: $solution:literal, severity: $severity:expr $(,)? }),* $(,)?) => {
        $(
            #[doc = concat!("Registry entry for `", $code, "`.")]
            pub const $const_name: ErrorCode = ErrorCode {
                code: $code,
                category: $category,
                description: $description,
                solution: $solution,
                severity: $severity,
            };
        )*

        /// Looks up a registry entry by its stable code string.
        #[must_use]
        pub fn lookup(code: &str) -> Option<ErrorCode> {
            match code {
                $($code => Some($const_name),)*
                _ => None,
            }
        }
    };
}

error_codes! {
    INIT_001 => {
        code: "INIT_001",
        category: ErrorCategory::Init,
        description: "Process initialization failed before any migration work began",
        solution: "Check the host has sufficient permissions and disk space, then retry",
        severity: Severity::Critical,
    },
    INIT_002 => {
        code: "INIT_002",
        category: ErrorCategory::Init,
        description: "Required runtime directory could not be created",
        solution: "Verify the parent directory exists and is writable by the running user",
        severity: Severity::Critical,
    },
    CONFIG_001 => {
        code: "CONFIG_001",
        category: ErrorCategory::Config,
        description: "Configuration file is missing required fields or failed to parse",
        solution: "Validate the YAML configuration against the documented schema",
        severity: Severity::Critical,
    },
    MOUNT_001 => {
        code: "MOUNT_001",
        category: ErrorCategory::Mount,
        description: "Source share or volume could not be mounted",
        solution: "Confirm network reachability and credentials, then retry",
        severity: Severity::Error,
    },
    MOUNT_002 => {
        code: "MOUNT_002",
        category: ErrorCategory::Mount,
        description: "Mount succeeded but the expected mount point is not accessible",
        solution: "Check mount point permissions and that the share exports the expected path",
        severity: Severity::Error,
    },
    MOUNT_003 => {
        code: "MOUNT_003",
        category: ErrorCategory::Mount,
        description: "Unmount of the source failed after migration completed",
        solution: "Unmount manually; this does not affect migration correctness",
        severity: Severity::Error,
    },
    SOURCE_001 => {
        code: "SOURCE_001",
        category: ErrorCategory::Source,
        description: "Source host directory does not exist or is not a directory",
        solution: "Verify the configured source root path",
        severity: Severity::Error,
    },
    SOURCE_002 => {
        code: "SOURCE_002",
        category: ErrorCategory::Source,
        description: "Source tree enumeration failed partway through",
        solution: "Check for filesystem errors on the source and retry",
        severity: Severity::Error,
    },
    SOURCE_003 => {
        code: "SOURCE_003",
        category: ErrorCategory::Source,
        description: "Insufficient permissions to read the source directory",
        solution: "Grant read access to the account running the migration",
        severity: Severity::Error,
    },
    TARGET_001 => {
        code: "TARGET_001",
        category: ErrorCategory::Target,
        description: "Target path does not exist and could not be created",
        solution: "Verify the target filesystem has free space and correct permissions",
        severity: Severity::Error,
    },
    TARGET_002 => {
        code: "TARGET_002",
        category: ErrorCategory::Target,
        description: "Target directory rename (phase B) failed",
        solution: "Check for a stale lock or conflicting file at the rename destination",
        severity: Severity::Error,
    },
    TARGET_003 => {
        code: "TARGET_003",
        category: ErrorCategory::Target,
        description: "Ownership or permission assignment on the target home failed",
        solution: "Confirm the local user and group exist and the process has CAP_CHOWN",
        severity: Severity::Error,
    },
    COPY_001 => {
        code: "COPY_001",
        category: ErrorCategory::Copy,
        description: "File copy failed due to an I/O error",
        solution: "Check disk space and source/target filesystem health, then retry",
        severity: Severity::Error,
    },
    COPY_002 => {
        code: "COPY_002",
        category: ErrorCategory::Copy,
        description: "Destination basename could not be made unique within its directory",
        solution: "Inspect the directory for an unusually large number of colliding names",
        severity: Severity::Error,
    },
    COPY_003 => {
        code: "COPY_003",
        category: ErrorCategory::Copy,
        description: "Preserving mtime or mode on the copied file failed",
        solution: "Check that the target filesystem supports the required metadata operations",
        severity: Severity::Warning,
    },
    VERIFY_001 => {
        code: "VERIFY_001",
        category: ErrorCategory::Verify,
        description: "Computed digest or size did not match the expected value",
        solution: "Re-copy the file; if the mismatch persists, inspect the source for corruption",
        severity: Severity::Error,
    },
    VERIFY_002 => {
        code: "VERIFY_002",
        category: ErrorCategory::Verify,
        description: "I/O error occurred while computing a verification digest",
        solution: "Check source and target filesystem health, then retry",
        severity: Severity::Error,
    },
    VERIFY_003 => {
        code: "VERIFY_003",
        category: ErrorCategory::Verify,
        description: "Requested integrity algorithm is not supported",
        solution: "Fix the configured integrity method or hash algorithm",
        severity: Severity::Critical,
    },
    USER_001 => {
        code: "USER_001",
        category: ErrorCategory::User,
        description: "Local system user or group referenced by the migration does not exist",
        solution: "Create the local account/group or adjust the configured group name",
        severity: Severity::Error,
    },
    USER_002 => {
        code: "USER_002",
        category: ErrorCategory::User,
        description: "Source username could not be formatted into a valid Linux username",
        solution: "Check the username for unsupported characters or missing domain mapping",
        severity: Severity::Error,
    },
    USER_003 => {
        code: "USER_003",
        category: ErrorCategory::User,
        description: "Unhandled error escaped a per-user migration run",
        solution: "Inspect logs for the specific user; the run continues with remaining users",
        severity: Severity::Error,
    },
    NETWORK_001 => {
        code: "NETWORK_001",
        category: ErrorCategory::Network,
        description: "Network probe to the source host timed out",
        solution: "Check connectivity and DNS resolution to the source host",
        severity: Severity::Error,
    },
    NETWORK_002 => {
        code: "NETWORK_002",
        category: ErrorCategory::Network,
        description: "Network connection was reset or refused while reading the source",
        solution: "Check firewall rules and the source server's availability",
        severity: Severity::Error,
    },
    NETWORK_003 => {
        code: "NETWORK_003",
        category: ErrorCategory::Network,
        description: "Network share disconnected mid-migration",
        solution: "Reconnect the share; the next run resumes from the last checkpoint",
        severity: Severity::Error,
    },
    SYSTEM_001 => {
        code: "SYSTEM_001",
        category: ErrorCategory::System,
        description: "Unexpected operating system error",
        solution: "Inspect the system error details attached to this record",
        severity: Severity::Error,
    },
    SYSTEM_002 => {
        code: "SYSTEM_002",
        category: ErrorCategory::System,
        description: "Disk is full or quota exceeded on the target filesystem",
        solution: "Free space on the target or raise the quota, then retry",
        severity: Severity::Critical,
    },
    SYSTEM_003 => {
        code: "SYSTEM_003",
        category: ErrorCategory::System,
        description: "Process received a termination signal mid-run",
        solution: "No action needed; the supervisor will restart the orchestrator",
        severity: Severity::Error,
    },
}

/// The cause of a [`MigrationError`], typically an underlying `std::io::Error`
/// or a lower-level library error captured before it was discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cause {
    /// Type name of the underlying error (e.g. `"std::io::Error"`).
    pub kind: String,
    /// `Display` rendering of the underlying error.
    pub message: String,
}

impl Cause {
    /// Captures a cause from any `std::error::Error` implementor.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        Self {
            kind: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
        }
    }
}

/// A fully-formed, structured error as it flows through the system, carrying
/// enough context to be written verbatim into the journal's `last_error` field.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {details}")]
pub struct MigrationError {
    /// Stable error code, e.g. `"VERIFY_001"`.
    pub code: String,
    /// Category the code belongs to.
    pub category: ErrorCategory,
    /// Registry description of the failure class.
    pub description: String,
    /// Recommended remediation text.
    pub solution: String,
    /// Severity for this particular occurrence.
    pub severity: Severity,
    /// Run-time details specific to this occurrence.
    pub details: String,
    /// Arbitrary contextual key-values (paths, usernames, counters).
    pub context: BTreeMap<String, String>,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
    /// Underlying cause, if one was captured.
    pub cause: Option<Cause>,
}

impl MigrationError {
    /// Builds an error from a registry entry plus run-time details.
    #[must_use]
    pub fn new(code: ErrorCode, details: impl Into<String>) -> Self {
        Self {
            code: code.code.to_string(),
            category: code.category,
            description: code.description.to_string(),
            solution: code.solution.to_string(),
            severity: code.severity,
            details: details.into(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
            cause: None,
        }
    }

    /// Attaches a context key-value pair, builder-style.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches an underlying cause, builder-style.
    #[must_use]
    pub fn with_cause<E: std::error::Error>(mut self, err: &E) -> Self {
        self.cause = Some(Cause::from_error(err));
        self
    }

    /// Overrides the default severity for this occurrence.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Whether this error must transition the global status to `failed`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Critical || ErrorCode::always_fatal_category(self.category)
    }
}

/// A structured, journal-serializable snapshot of a [`MigrationError`].
///
/// Distinct from `MigrationError` only in intent: `ErrorRecord` is what gets
/// embedded as `GlobalState::last_error`, while `MigrationError` is the
/// in-process error type propagated via `Result`. The two have identical
/// shape today; the alias keeps call sites in `journal` self-documenting.
pub type ErrorRecord = MigrationError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_codes() {
        let entry = lookup("MOUNT_001").expect("MOUNT_001 is registered");
        assert_eq!(entry.category, ErrorCategory::Mount);
        assert_eq!(entry.severity, Severity::Error);
    }

    #[test]
    fn lookup_rejects_unknown_codes() {
        assert!(lookup("NOT_A_CODE").is_none());
    }

    #[test]
    fn critical_severity_is_always_fatal() {
        let err = MigrationError::new(SYSTEM_002, "disk full").with_severity(Severity::Critical);
        assert!(err.is_fatal());
    }

    #[test]
    fn init_category_is_fatal_even_at_warning_severity() {
        let err = MigrationError::new(INIT_001, "bootstrap failed").with_severity(Severity::Warning);
        assert!(err.is_fatal());
    }

    #[test]
    fn copy_category_error_is_not_fatal() {
        let err = MigrationError::new(COPY_001, "disk hiccup");
        assert!(!err.is_fatal());
    }

    #[test]
    fn serializes_to_the_documented_json_shape() {
        let err = MigrationError::new(VERIFY_001, "digest mismatch")
            .with_context("path", "/home/alice/Documents/a.txt");
        let value = serde_json::to_value(&err).expect("serializes");
        assert_eq!(value["code"], "VERIFY_001");
        assert_eq!(value["category"], "VERIFY");
        assert_eq!(value["context"]["path"], "/home/alice/Documents/a.txt");
    }
}
