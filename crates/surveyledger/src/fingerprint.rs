//! Deterministic fingerprint functions.
//!
//! A fingerprint is derived only from the submitter's identifying field, never
//! from the time or random state, so re-sending the same form always lands on
//! the same ledger key.

use crate::error::Result;
use crate::submission::Fingerprint;

/// Prefix shared by all generated fingerprints.
pub const FINGERPRINT_PREFIX: &str = "sub_";

/// Hex characters of the BLAKE3 digest kept in a fingerprint.
const BLAKE3_HEX_LEN: usize = 32;

/// Derives a [`Fingerprint`] from an identifying value.
pub trait Fingerprinter: Send + Sync + std::fmt::Debug {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Derive the fingerprint of `identity`.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `identity` is blank.
    fn fingerprint(&self, identity: &str) -> Result<Fingerprint>;
}

/// BLAKE3 content hash, truncated to 128 bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Fingerprinter;

impl Fingerprinter for Blake3Fingerprinter {
    fn name(&self) -> &'static str {
        "blake3"
    }

    fn fingerprint(&self, identity: &str) -> Result<Fingerprint> {
        let identity = require_identity(identity)?;
        let hex = blake3::hash(identity.as_bytes()).to_hex();
        Fingerprint::parse(&format!("{FINGERPRINT_PREFIX}{}", &hex[..BLAKE3_HEX_LEN]))
    }
}

/// The 31-multiplier rolling string hash used by earlier survey clients.
///
/// Kept so fingerprints of records written by those clients can be
/// reproduced. Only 32 bits wide, so collisions are far more likely than with
/// [`Blake3Fingerprinter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingHashFingerprinter;

impl RollingHashFingerprinter {
    fn rolling_hash(value: &str) -> i32 {
        // UTF-16 code units, as browsers hash strings.
        value.encode_utf16().fold(0_i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        })
    }
}

impl Fingerprinter for RollingHashFingerprinter {
    fn name(&self) -> &'static str {
        "rolling"
    }

    fn fingerprint(&self, identity: &str) -> Result<Fingerprint> {
        let identity = require_identity(identity)?;
        let hash = Self::rolling_hash(identity).unsigned_abs();
        Fingerprint::parse(&format!("{FINGERPRINT_PREFIX}{hash}"))
    }
}

fn require_identity(identity: &str) -> Result<&str> {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        return Err(crate::Error::invalid_argument("identifying field is empty"));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_is_deterministic() {
        let f = Blake3Fingerprinter;
        let a = f.fingerprint("acc-001").unwrap();
        let b = f.fingerprint("acc-001").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, f.fingerprint("acc-002").unwrap());
    }

    #[test]
    fn test_blake3_shape() {
        let fp = Blake3Fingerprinter.fingerprint("acc-001").unwrap();
        assert!(fp.as_str().starts_with(FINGERPRINT_PREFIX));
        assert_eq!(fp.as_str().len(), FINGERPRINT_PREFIX.len() + BLAKE3_HEX_LEN);
        assert!(fp.as_str()[FINGERPRINT_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_blake3_matches_digest_prefix() {
        let expected = blake3::hash(b"acc-001").to_hex();
        let fp = Blake3Fingerprinter.fingerprint("acc-001").unwrap();
        assert_eq!(&fp.as_str()[4..], &expected[..32]);
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let f = Blake3Fingerprinter;
        assert_eq!(
            f.fingerprint("  acc-001\n").unwrap(),
            f.fingerprint("acc-001").unwrap()
        );
    }

    #[test]
    fn test_blank_identity_rejected() {
        assert!(Blake3Fingerprinter.fingerprint("  ").is_err());
        assert!(RollingHashFingerprinter.fingerprint("").is_err());
    }

    #[test]
    fn test_rolling_hash_known_values() {
        // "a" = 97; "ab" = 97 * 31 + 98 = 3105.
        assert_eq!(RollingHashFingerprinter::rolling_hash("a"), 97);
        assert_eq!(RollingHashFingerprinter::rolling_hash("ab"), 3105);
        assert_eq!(
            RollingHashFingerprinter.fingerprint("ab").unwrap().as_str(),
            "sub_3105"
        );
    }

    #[test]
    fn test_rolling_hash_wraps() {
        let long = "z".repeat(1_000);
        let fp = RollingHashFingerprinter.fingerprint(&long).unwrap();
        assert!(fp.as_str().len() <= 4 + 10);
        assert_eq!(fp, RollingHashFingerprinter.fingerprint(&long).unwrap());
    }

    #[test]
    fn test_names() {
        assert_eq!(Blake3Fingerprinter.name(), "blake3");
        assert_eq!(RollingHashFingerprinter.name(), "rolling");
    }
}
