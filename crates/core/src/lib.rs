//! Orchestrator crate: configuration loading, credential-at-rest handling,
//! external collaborator interfaces, and the per-run user migration loop.

pub mod collaborators;
pub mod config;
pub mod credentials;
pub mod orchestrator;

pub use collaborators::{
    ConfigLoader, DiskEnumerator, FileConfigLoader, HashIndexProvider, Mounter, Notifier, PrinterRegistrar, Reporter,
    ShortcutCreator,
};
pub use config::{Config, IntegrityMethod, SourceType};
pub use credentials::{encrypt_all, encrypt_pass, resolve_credential, CredentialDecryptor, FernetCredentials};
pub use orchestrator::{run, CancellationToken, Collaborators, RunOutcome};
