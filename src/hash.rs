// src/hash.rs

//! Content fingerprints for stub files
//!
//! Every stub in the definitions tree is identified by the SHA-256 of its
//! bytes. The same fingerprint keys the local cache and decides whether an
//! installed file is already up to date.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Hex length of a SHA-256 digest
const SHA256_HEX_LEN: usize = 64;

/// Fingerprint parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FingerprintError {
    /// Hash string has wrong length
    #[error("invalid fingerprint length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    /// Hash string contains invalid hex characters
    #[error("invalid hex in fingerprint: {0}")]
    InvalidHex(String),
}

/// A lowercase SHA-256 hex digest of stub content
///
/// Construction validates the digest shape, so a fingerprint is always safe
/// to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a byte slice
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint everything a reader yields
    pub fn of_reader<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Fingerprint a file on disk, streaming its content
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        Self::of_reader(&mut file)
    }

    /// Get the digest as a hex string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and reports
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    /// Check whether `data` hashes to this fingerprint
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SHA256_HEX_LEN {
            return Err(FingerprintError::InvalidLength {
                expected: SHA256_HEX_LEN,
                got: s.len(),
            });
        }

        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FingerprintError::InvalidHex(s.to_string()));
        }

        Ok(Self(s.to_lowercase()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_fingerprint_known_value() {
        let fp = Fingerprint::of(b"hello world");
        assert_eq!(fp.as_str(), HELLO_WORLD);
        assert_eq!(fp.short(), "b94d27b9934d");
    }

    #[test]
    fn test_fingerprint_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        let from_reader = Fingerprint::of_reader(&mut data.as_slice()).unwrap();
        assert_eq!(from_reader, Fingerprint::of(&data));
    }

    #[test]
    fn test_fingerprint_parse_normalizes_case() {
        let fp: Fingerprint = HELLO_WORLD.to_uppercase().parse().unwrap();
        assert_eq!(fp.as_str(), HELLO_WORLD);
    }

    #[test]
    fn test_fingerprint_parse_rejects_bad_input() {
        assert!(matches!(
            "abc".parse::<Fingerprint>(),
            Err(FingerprintError::InvalidLength { expected: 64, got: 3 })
        ));

        let not_hex = "../".repeat(21) + "z";
        assert!(matches!(
            not_hex.parse::<Fingerprint>(),
            Err(FingerprintError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_fingerprint_matches() {
        let fp = Fingerprint::of(b"declare module 'x' {}");
        assert!(fp.matches(b"declare module 'x' {}"));
        assert!(!fp.matches(b"declare module 'y' {}"));
    }
}
