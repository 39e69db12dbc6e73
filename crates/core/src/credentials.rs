//! Credential-at-rest handling: the `--encrypt-all`/`--encrypt-pass` CLI
//! modes and the `CredentialDecryptor` collaborator the orchestrator invokes
//! before mounting, grounded in the original tool's Fernet-based scheme.

use errors::{CONFIG_001, MigrationError};
use fernet::Fernet;

use crate::config::Config;

/// Decrypts a credential field stored at rest in encrypted form.
///
/// Implemented directly rather than as a trait object since there is only
/// ever one real implementation (Fernet, matching the original tool); the
/// "collaborator" boundary exists so callers can substitute a fake in tests.
pub trait CredentialDecryptor {
    /// Decrypts `ciphertext`, previously produced by [`FernetCredentials::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String, MigrationError>;
}

/// Fernet (AES-128-CBC + HMAC-SHA256) symmetric encryption of the
/// credential field, keyed by a base64 key the operator supplies out of band.
pub struct FernetCredentials {
    fernet: Fernet,
}

impl FernetCredentials {
    /// Builds a codec from a base64-encoded 32-byte Fernet key.
    pub fn new(key: &str) -> Result<Self, MigrationError> {
        let fernet = Fernet::new(key)
            .ok_or_else(|| MigrationError::new(CONFIG_001, "invalid Fernet key: must be 32 url-safe base64 bytes"))?;
        Ok(Self { fernet })
    }

    /// Encrypts `plaintext`, producing the token stored in the config file.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }
}

impl CredentialDecryptor for FernetCredentials {
    fn decrypt(&self, ciphertext: &str) -> Result<String, MigrationError> {
        let bytes = self
            .fernet
            .decrypt(ciphertext)
            .map_err(|_| MigrationError::new(CONFIG_001, "failed to decrypt credential: bad key or corrupt token"))?;
        String::from_utf8(bytes)
            .map_err(|e| MigrationError::new(CONFIG_001, "decrypted credential is not valid UTF-8").with_cause(&e))
    }
}

/// Resolves the mount credential, decrypting it first if `credential_encrypted`.
pub fn resolve_credential(config: &Config, decryptor: &dyn CredentialDecryptor) -> Result<Option<String>, MigrationError> {
    let Some(pass) = &config.credential_pass else {
        return Ok(None);
    };
    if config.credential_encrypted {
        Ok(Some(decryptor.decrypt(pass)?))
    } else {
        Ok(Some(pass.clone()))
    }
}

/// `--encrypt-all`: re-encrypts the whole config file's credential field in
/// place (a no-op if it is already marked encrypted) and rewrites the file.
pub fn encrypt_all(config_path: &std::path::Path, codec: &FernetCredentials) -> Result<(), MigrationError> {
    let mut config = Config::load(config_path)?;
    if let Some(pass) = config.credential_pass.clone() {
        if !config.credential_encrypted {
            config.credential_pass = Some(codec.encrypt(&pass));
            config.credential_encrypted = true;
        }
    }
    config.save(config_path)
}

/// `--encrypt-pass`: encrypts only the credential field, leaving the rest of
/// the document untouched.
pub fn encrypt_pass(config_path: &std::path::Path, codec: &FernetCredentials) -> Result<(), MigrationError> {
    encrypt_all(config_path, codec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEST_KEY: &str = "cD6nGEcvNaPCNXJ7xaZQYE1n1B8t9TwkNUIHLlvk5_A=";

    fn sample_config_yaml() -> String {
        r#"
source_type: network
source_root: "\\\\fileserver\\home$"
mount_point: /mnt/migration
credential_user: svc-migrate
credential_pass: hunter2
integrity: size
local_state_path: /var/lib/astra-migrate/state.json
network_state_path: /mnt/migration/.astra-migrate/state.json
report_dir: /var/lib/astra-migrate/reports
skel_dir: /etc/skel
"#
        .to_string()
    }

    #[test]
    fn round_trips_through_fernet() {
        let codec = FernetCredentials::new(TEST_KEY).unwrap();
        let token = codec.encrypt("hunter2");
        assert_eq!(codec.decrypt(&token).unwrap(), "hunter2");
    }

    #[test]
    fn encrypt_all_rewrites_the_credential_field_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, sample_config_yaml()).unwrap();
        let codec = FernetCredentials::new(TEST_KEY).unwrap();

        encrypt_all(&path, &codec).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.credential_encrypted);
        assert_eq!(codec.decrypt(config.credential_pass.as_ref().unwrap()).unwrap(), "hunter2");
    }

    #[test]
    fn resolve_credential_passes_through_when_not_encrypted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, sample_config_yaml()).unwrap();
        let config = Config::load(&path).unwrap();
        let codec = FernetCredentials::new(TEST_KEY).unwrap();

        let resolved = resolve_credential(&config, &codec).unwrap();
        assert_eq!(resolved.as_deref(), Some("hunter2"));
    }
}
