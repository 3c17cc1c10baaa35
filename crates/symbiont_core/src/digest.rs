//! Content digests for compiled artifacts.
//!
//! Uses BLAKE3 for all hashing operations.

use std::fmt;

/// A BLAKE3 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Compute a digest over a sequence of parts
    ///
    /// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]`
    /// never collide.
    #[must_use]
    pub fn compute_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            let bytes = part.as_ref();
            hasher.update(&(bytes.len() as u64).to_be_bytes());
            hasher.update(bytes);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_deterministic() {
        assert_eq!(Digest::compute_parts(["abc"]), Digest::compute_parts(["abc"]));
        assert_ne!(Digest::compute_parts(["abc"]), Digest::compute_parts(["abd"]));
    }

    #[test]
    fn test_parts_are_framed() {
        let a = Digest::compute_parts(["ab", "c"]);
        let b = Digest::compute_parts(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_display_is_hex() {
        let digest = Digest::compute_parts(["fields"]);
        let shown = digest.to_string();
        assert_eq!(shown.len(), 64);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(shown, digest.to_hex());
    }
}
