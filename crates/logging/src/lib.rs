#![deny(unsafe_code)]

//! Logging initialization and verbosity-flag plumbing shared by both binaries.
//!
//! The orchestrator and supervisor CLIs each accept repeated `-v` flags; this
//! crate turns that count into a [`Verbosity`] and builds a single
//! `tracing_subscriber` subscriber from it so every component logs through the
//! same formatter regardless of which binary hosts it.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Verbosity level selected by CLI flag count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Warnings and errors only.
    #[default]
    Quiet,
    /// Adds informational messages (`-v`).
    Info,
    /// Adds debug messages (`-vv`).
    Debug,
    /// Adds trace-level messages (`-vvv`).
    Trace,
}

impl Verbosity {
    /// Maps a repeated-flag count to a verbosity level.
    #[must_use]
    pub fn from_flag_count(count: u8) -> Self {
        match count {
            0 => Self::Quiet,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

static INIT: Once = Once::new();

/// Installs a global `tracing` subscriber at the given verbosity.
///
/// Safe to call more than once; only the first call takes effect, matching
/// the one-shot process lifetime of the orchestrator and supervisor.
pub fn init(verbosity: Verbosity) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_count_maps_to_expected_level() {
        assert_eq!(Verbosity::from_flag_count(0), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flag_count(1), Verbosity::Info);
        assert_eq!(Verbosity::from_flag_count(2), Verbosity::Debug);
        assert_eq!(Verbosity::from_flag_count(5), Verbosity::Trace);
    }

    #[test]
    fn directives_are_valid_env_filter_strings() {
        for v in [
            Verbosity::Quiet,
            Verbosity::Info,
            Verbosity::Debug,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(v.directive()).is_ok());
        }
    }
}
