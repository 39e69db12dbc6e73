//! Orchestrator CLI: argument parsing, credential-encryption subcommands,
//! mount collaborator wiring, and the exit-code mapping the binary entry
//! point forwards to the shell.

mod mount;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use core::{CancellationToken, Collaborators, Config, CredentialDecryptor, FernetCredentials, RunOutcome};
use errors::MigrationError;
use mount::{CifsMounter, UsbMounter};

#[derive(Parser)]
#[command(name = "astra-migrate", about = "Migrates Windows-era home directories onto this host")]
struct Cli {
    /// Path to the YAML configuration document.
    #[arg(long, default_value = "/etc/astra-migrate/config.yaml")]
    config: PathBuf,

    /// Re-encrypts the whole config file's credential field in place.
    #[arg(long, conflicts_with = "encrypt_pass")]
    encrypt_all: bool,

    /// Encrypts only the credential field, leaving the rest untouched.
    #[arg(long, conflicts_with = "encrypt_all")]
    encrypt_pass: bool,

    /// Base64 Fernet key, required with `--encrypt-all`/`--encrypt-pass`.
    #[arg(long, env = "ASTRA_MIGRATE_FERNET_KEY")]
    fernet_key: Option<String>,

    /// Increase log verbosity (info, then debug).
    #[arg(short, action = clap::ArgAction::Count)]
    v: u8,
}

/// Parses arguments, runs the requested mode, and returns the process exit
/// code (0 success, 1 fatal initialization error, 2 completed with error).
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    logging::init(logging::Verbosity::from_flag_count(cli.v));

    if cli.encrypt_all || cli.encrypt_pass {
        return match run_encrypt(&cli) {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(error = %e, "credential encryption failed");
                1
            }
        };
    }

    match run_migration(&cli.config) {
        Ok(RunOutcome::Success) => 0,
        Ok(RunOutcome::CompletedWithError) => 2,
        Ok(RunOutcome::Failed) => 1,
        Err(e) => {
            tracing::error!(error = %e, "fatal initialization error");
            1
        }
    }
}

fn run_encrypt(cli: &Cli) -> Result<(), MigrationError> {
    let key = cli.fernet_key.as_deref().ok_or_else(|| {
        MigrationError::new(errors::CONFIG_001, "--encrypt-all/--encrypt-pass require a Fernet key")
    })?;
    let codec = FernetCredentials::new(key)?;
    if cli.encrypt_all {
        core::encrypt_all(&cli.config, &codec)
    } else {
        core::encrypt_pass(&cli.config, &codec)
    }
}

fn run_migration(config_path: &std::path::Path) -> Result<RunOutcome, MigrationError> {
    let config = Config::load(config_path)?;

    let credential_pass = match (&config.credential_pass, config.credential_encrypted) {
        (Some(pass), true) => {
            let key = std::env::var("ASTRA_MIGRATE_FERNET_KEY").map_err(|_| {
                MigrationError::new(errors::CONFIG_001, "credential is encrypted but ASTRA_MIGRATE_FERNET_KEY is not set")
            })?;
            Some(FernetCredentials::new(&key)?.decrypt(pass)?)
        }
        (Some(pass), false) => Some(pass.clone()),
        (None, _) => None,
    };

    let mounter: Box<dyn core::Mounter> = match config.source_type {
        core::SourceType::Network => Box::new(CifsMounter {
            source: config.source_root.clone(),
            mount_point: config.mount_point.clone(),
            username: config.credential_user.clone().unwrap_or_default(),
            password: credential_pass.unwrap_or_default(),
            credentials_path: config.mount_point.with_file_name(".astra-migrate-cred"),
        }),
        core::SourceType::Usb => Box::new(UsbMounter {
            device: config.source_root.clone(),
            mount_point: config.mount_point.clone(),
        }),
    };

    let hash_index = load_hash_index(&config)?;

    core::run(&config, mounter.as_ref(), hash_index, &Collaborators::default(), CancellationToken::new())
}

fn load_hash_index(config: &Config) -> Result<Option<Arc<std::collections::HashMap<String, String>>>, MigrationError> {
    let Some(db_path) = &config.hash_index_path else {
        return Ok(None);
    };
    let mapping = pathmap::PathMapping::default_astra();
    let index = checksums::load_hash_index(db_path, &mapping, &config.mount_point.to_string_lossy(), None)?;
    Ok(Some(Arc::new(index)))
}
