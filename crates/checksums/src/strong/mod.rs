//! Strong digest implementations used by the integrity checker.
//!
//! The migration configuration selects between SHA-256 (the default) and MD5
//! for compatibility with hash indexes produced by older tooling. Both are
//! exposed behind the [`StrongDigest`] trait so [`crate::hash_file`] can stay
//! generic over the chosen algorithm.

mod md5;
mod sha256;

pub use md5::Md5;
pub use sha256::Sha256;

/// Trait implemented by the strong checksum algorithms the integrity checker
/// can compute.
///
/// Implementors provide a streaming interface: callers feed data incrementally
/// via [`Self::update`] and then obtain the final digest through
/// [`Self::finalize`]. The associated [`DIGEST_LEN`](Self::DIGEST_LEN)
/// constant exposes the byte width of the resulting hash so callers can format
/// it without hard-coding algorithm-specific knowledge.
///
/// # Examples
///
/// ```
/// use checksums::strong::{Md5, StrongDigest};
///
/// let mut hasher = Md5::new();
/// hasher.update(b"example");
/// let digest = hasher.finalize();
/// assert_eq!(digest.as_ref().len(), Md5::DIGEST_LEN);
/// ```
pub trait StrongDigest: Sized {
    /// Type used to parameterise a new digest instance.
    type Seed: Default;

    /// Type returned when finalising the digest.
    type Digest: AsRef<[u8]> + Copy;

    /// Length of the final digest in bytes.
    const DIGEST_LEN: usize;

    /// Creates a new hasher with an empty state.
    fn new() -> Self {
        Self::with_seed(Default::default())
    }

    /// Creates a new hasher using the provided seed value.
    fn with_seed(seed: Self::Seed) -> Self;

    /// Feeds additional bytes into the digest state.
    fn update(&mut self, data: &[u8]);

    /// Finalises the digest and returns the resulting hash.
    fn finalize(self) -> Self::Digest;

    /// Convenience helper that hashes `data` in a single call.
    fn digest(data: &[u8]) -> Self::Digest {
        Self::digest_with_seed(Default::default(), data)
    }

    /// Convenience helper that hashes `data` using an explicit seed value.
    fn digest_with_seed(seed: Self::Seed, data: &[u8]) -> Self::Digest {
        let mut hasher = Self::with_seed(seed);
        hasher.update(data);
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::{Md5, Sha256, StrongDigest};

    #[test]
    fn md5_trait_round_trip_matches_inherent_api() {
        let input = b"trait-check";

        let mut via_trait = Md5::new();
        via_trait.update(input);
        let trait_digest = via_trait.finalize();

        assert_eq!(trait_digest.as_ref(), Md5::digest(input).as_ref());
    }

    #[test]
    fn sha256_trait_matches_inherent_api() {
        let input = b"sha256-check";

        let mut via_trait = Sha256::new();
        via_trait.update(input);
        let trait_digest = via_trait.finalize();

        assert_eq!(trait_digest.as_ref(), Sha256::digest(input).as_ref());
    }
}
