//! Streaming file hashing, size/metadata comparison, and verify-with-retry.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use errors::{MigrationError, VERIFY_001, VERIFY_002, VERIFY_003};

use crate::strong::{Md5, Sha256, StrongDigest};

const BLOCK_SIZE: usize = 64 * 1024;

/// Hash algorithm selectable for integrity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256, the default.
    Sha256,
    /// MD5, kept for compatibility with older hash indexes.
    Md5,
}

impl HashAlgorithm {
    /// Parses the configuration string `"sha256"`/`"md5"` (case-insensitive).
    pub fn parse(name: &str) -> Result<Self, MigrationError> {
        match name.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "md5" => Ok(Self::Md5),
            other => Err(MigrationError::new(
                VERIFY_003,
                format!("unsupported hash algorithm: {other}"),
            )),
        }
    }
}

/// Streams `path` in fixed-size blocks and returns its lowercase hex digest.
/// Never loads the whole file into memory.
pub fn hash_file(path: &Path, algo: HashAlgorithm) -> Result<String, MigrationError> {
    let mut file = File::open(path).map_err(|e| {
        MigrationError::new(VERIFY_002, format!("failed to open {}", path.display())).with_cause(&e)
    })?;

    let mut buf = [0u8; BLOCK_SIZE];
    let digest_hex = match algo {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = file.read(&mut buf).map_err(|e| {
                    MigrationError::new(VERIFY_002, format!("failed to read {}", path.display()))
                        .with_cause(&e)
                })?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            to_hex(&hasher.finalize())
        }
        HashAlgorithm::Md5 => {
            let mut hasher = Md5::new();
            loop {
                let n = file.read(&mut buf).map_err(|e| {
                    MigrationError::new(VERIFY_002, format!("failed to read {}", path.display()))
                        .with_cause(&e)
                })?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            to_hex(&hasher.finalize())
        }
    };

    Ok(digest_hex)
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

fn file_metadata(path: &Path) -> std::io::Result<std::fs::Metadata> {
    std::fs::metadata(path)
}

/// Byte-length equality of two files.
#[must_use]
pub fn compare_size(a: &Path, b: &Path) -> bool {
    match (file_metadata(a), file_metadata(b)) {
        (Ok(a_meta), Ok(b_meta)) => a_meta.len() == b_meta.len(),
        _ => false,
    }
}

/// Byte-length equality AND integer-second mtime equality.
#[must_use]
pub fn compare_metadata(a: &Path, b: &Path) -> bool {
    use std::time::UNIX_EPOCH;

    let (a_meta, b_meta) = match (file_metadata(a), file_metadata(b)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return false,
    };
    if a_meta.len() != b_meta.len() {
        return false;
    }
    let a_secs = a_meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    let b_secs = b_meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs());
    a_secs == b_secs
}

/// Recomputes the digest of `path` up to `retries + 1` times, comparing
/// case-insensitively against `expected`, returning `true` on the first match.
pub fn verify_with_retry(
    path: &Path,
    expected: &str,
    algo: HashAlgorithm,
    retries: u32,
    retry_delay: Duration,
) -> Result<bool, MigrationError> {
    let expected_lower = expected.to_ascii_lowercase();
    let mut last_err = None;

    for attempt in 0..=retries {
        match hash_file(path, algo) {
            Ok(actual) => {
                if actual.eq_ignore_ascii_case(&expected_lower) {
                    return Ok(true);
                }
                if attempt == retries {
                    return Ok(false);
                }
            }
            Err(e) => {
                last_err = Some(e);
            }
        }
        if attempt < retries {
            std::thread::sleep(retry_delay);
        }
    }

    if let Some(e) = last_err {
        return Err(e);
    }
    Ok(false)
}

/// Raised by callers that want a typed mismatch error rather than a bare `bool`.
#[must_use]
pub fn mismatch_error(path: &Path, expected: &str, actual: &str) -> MigrationError {
    MigrationError::new(
        VERIFY_001,
        format!("digest mismatch for {}: expected {expected}, got {actual}", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn hash_file_sha256_matches_known_vector() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        let digest = hash_file(&path, HashAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn compare_size_detects_mismatch() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"hello").unwrap();
        std::fs::write(&b, b"hello!").unwrap();
        assert!(!compare_size(&a, &b));
    }

    #[test]
    fn compare_size_matches_equal_length_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"hello").unwrap();
        std::fs::write(&b, b"world").unwrap();
        assert!(compare_size(&a, &b));
    }

    #[test]
    fn verify_with_retry_succeeds_on_matching_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        let expected = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let ok = verify_with_retry(&path, expected, HashAlgorithm::Sha256, 2, Duration::from_millis(1))
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn verify_with_retry_reports_false_after_exhausting_retries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"abc").unwrap();
        let ok = verify_with_retry(&path, "deadbeef", HashAlgorithm::Sha256, 1, Duration::from_millis(1))
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn unsupported_algorithm_name_is_a_typed_error() {
        assert!(HashAlgorithm::parse("crc32").is_err());
    }
}
