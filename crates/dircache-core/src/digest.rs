//! The 20-byte SHA-1 digest that names every object and verifies the index.

use sha1::{Digest as _, Sha1};
use std::fmt;
use thiserror::Error;

/// A 20-byte SHA-1 digest. The raw form is what gets stored on disk; the
/// hex form is only for human-facing I/O (argv, printed output, path
/// segments).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 20]);

/// Error returned when a hex string cannot be parsed into a [`Digest`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    /// The string was not exactly 40 characters long.
    #[error("expected 40 hex characters, got {0}")]
    BadLength(usize),
    /// The string contained a byte outside `[0-9a-fA-F]`.
    #[error("invalid hex digit {0:#04x} at position {1}")]
    BadDigit(u8, usize),
}

impl Digest {
    /// Compute the SHA-1 digest of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(bytes);
        let out = hasher.finalize();
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&out);
        Self(raw)
    }

    /// Lower-case 40-character hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 40-character lower- or upper-case hex string into a digest.
    ///
    /// Rejects any character outside `[0-9a-fA-F]`, matching the original
    /// `get_sha1_hex`'s strict `hexval` check rather than silently masking
    /// invalid nibbles.
    pub fn from_hex(hex_str: &str) -> Result<Self, HexError> {
        let bytes = hex_str.as_bytes();
        if bytes.len() != 40 {
            return Err(HexError::BadLength(bytes.len()));
        }
        for (i, &b) in bytes.iter().enumerate() {
            if !b.is_ascii_hexdigit() {
                return Err(HexError::BadDigit(b, i));
            }
        }
        let mut raw = [0u8; 20];
        hex::decode_to_slice(hex_str, &mut raw)
            .map_err(|_| HexError::BadDigit(bytes[0], 0))?;
        Ok(Self(raw))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_hex() {
        let d = Digest::of(b"hello");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 40);
        let back = Digest::from_hex(&hex).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn from_hex_rejects_bad_length() {
        assert_eq!(Digest::from_hex("abcd"), Err(HexError::BadLength(4)));
    }

    #[test]
    fn from_hex_rejects_non_hex_digit() {
        let mut s = "0".repeat(40);
        s.replace_range(10..11, "g");
        assert!(matches!(Digest::from_hex(&s), Err(HexError::BadDigit(b'g', 10))));
    }

    #[test]
    fn from_hex_accepts_uppercase() {
        let d = Digest::of(b"hello");
        let upper = d.to_hex().to_uppercase();
        assert_eq!(Digest::from_hex(&upper).unwrap(), d);
    }

    #[test]
    fn same_bytes_same_digest_regardless_of_order() {
        let a = Digest::of(b"abc");
        let b = Digest::of(b"abc");
        assert_eq!(a, b);
    }
}
