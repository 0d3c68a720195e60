//! Randomness, one-way hashing and constant-time comparison.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::TokenResult;
use crate::error::TokenError;

/// Random bytes behind a `jti`.
pub const JTI_BYTES: usize = 36;

/// Length of an encoded `jti`, the first segment of every opaque value.
pub const JTI_LENGTH: usize = 48;

/// Random bytes behind the bearer secret of the plain encoding.
pub const SECRET_BYTES: usize = 64;

/// Random bytes behind a checksum-secret.
pub const CHECKSUM_SECRET_BYTES: usize = 8;

/// Length of an encoded checksum-secret.
pub const CHECKSUM_SECRET_LENGTH: usize = 11;

/// Returns `len` bytes from the OS entropy source, base64url encoded.
///
/// # Errors
/// Returns an internal error if the entropy source fails.
pub fn random_base64url(len: usize) -> TokenResult<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::internal(format!("entropy source failed: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generates a fresh token identifier.
///
/// # Errors
/// Returns an internal error if the entropy source fails.
pub fn generate_jti() -> TokenResult<String> {
    random_base64url(JTI_BYTES)
}

/// One-way hash of a checksum-secret: left half of SHA-256, base64url.
#[must_use]
pub fn checksum_hash(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Fixed-time string equality. Different lengths compare unequal.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    ::constant_time_eq::constant_time_eq(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(generate_jti().unwrap().len(), JTI_LENGTH);
        assert_eq!(
            random_base64url(CHECKSUM_SECRET_BYTES).unwrap().len(),
            CHECKSUM_SECRET_LENGTH
        );
        assert_eq!(random_base64url(SECRET_BYTES).unwrap().len(), 86);
    }

    #[test]
    fn test_randomness() {
        assert_ne!(generate_jti().unwrap(), generate_jti().unwrap());
    }

    #[test]
    fn test_checksum_hash() {
        let hash = checksum_hash("elevenchars");
        assert_eq!(hash.len(), 22);
        assert_eq!(hash, checksum_hash("elevenchars"));
        assert_ne!(hash, checksum_hash("elevenchar5"));

        // Left half of the SHA-256 digest of "abc".
        let digest = Sha256::digest(b"abc");
        assert_eq!(checksum_hash("abc"), URL_SAFE_NO_PAD.encode(&digest[..16]));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("signature", "signature"));
        assert!(!constant_time_eq("signature", "signaturf"));
        assert!(!constant_time_eq("sig", "signature"));
        assert!(constant_time_eq("", ""));
    }
}
