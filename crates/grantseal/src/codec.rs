//! Token codec.
//!
//! Turns a claim set into the three-part `header.payload.signature`
//! structure and back. Two encodings exist:
//!
//! - **unsigned**: `alg` is `none`; header and payload are still base64url
//!   JSON, and the signature slot carries a caller supplied random value
//!   that acts as the bearer secret.
//! - **signed**: a genuine JWS produced with a key from the
//!   [`IntegrityKeystore`], `kid` header set.
//!
//! [`decode`] parses without any trust decision. [`verify`] checks the
//! signature, the issuer and (unless ignored) the expiration.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::keystore::{IntegrityKey, IntegrityKeystore};

/// Header of the unsigned encoding.
const NONE_HEADER: &str = r#"{"alg":"none","typ":"JWT"}"#;

/// Errors that can occur while encoding, decoding or verifying.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// No verification key matches the `kid` header.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found.
        kid: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl CodecError {
    /// Creates a new `Encoding` error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a new `Decoding` error.
    #[must_use]
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if this error says the presented token is not acceptable
    /// (as opposed to a local encoding or key problem).
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Decoding { .. }
                | Self::Expired
                | Self::InvalidSignature
                | Self::InvalidClaims { .. }
                | Self::KeyNotFound { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for CodecError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::decoding(err.to_string()),
        }
    }
}

/// The three parts of an encoded token, kept apart for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedParts {
    /// Base64url JSON header.
    pub header: String,
    /// Base64url JSON payload.
    pub payload: String,
    /// Signature (or bearer secret for the unsigned encoding).
    pub signature: String,
}

impl EncodedParts {
    /// Splits a compact `header.payload.signature` string.
    ///
    /// # Errors
    /// Returns a decoding error unless there are exactly three parts.
    pub fn from_compact(compact: &str) -> Result<Self, CodecError> {
        let mut parts = compact.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => Ok(Self {
                header: header.to_string(),
                payload: payload.to_string(),
                signature: signature.to_string(),
            }),
            _ => Err(CodecError::decoding("expected three dot separated parts")),
        }
    }

    /// Joins the parts into the compact serialization.
    #[must_use]
    pub fn compact(&self) -> String {
        format!("{}.{}.{}", self.header, self.payload, self.signature)
    }
}

/// Standard claims wrapped around a caller supplied claim set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet<T> {
    /// Issuer.
    pub iss: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp); absent for tokens that never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Caller claims.
    #[serde(flatten)]
    pub claims: T,
}

/// Parameters of an encode call.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions<'a> {
    /// Issuer written to `iss`.
    pub issuer: &'a str,
    /// Lifetime in seconds; `None` means no `exp` claim.
    pub expires_in: Option<i64>,
    /// Current epoch seconds, written to `iat`.
    pub now: i64,
}

/// Parameters of a verify call.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions<'a> {
    /// Expected issuer.
    pub issuer: &'a str,
    /// Skip the expiration check.
    pub ignore_expiration: bool,
    /// Current epoch seconds.
    pub now: i64,
}

fn claim_set<T>(claims: T, options: &EncodeOptions<'_>) -> ClaimSet<T> {
    ClaimSet {
        iss: options.issuer.to_string(),
        iat: options.now,
        exp: options.expires_in.map(|ttl| options.now.saturating_add(ttl)),
        claims,
    }
}

/// Encodes `claims` with the no-op `none` algorithm.
///
/// `secret` fills the signature slot; it must be a fresh high-entropy value.
///
/// # Errors
/// Returns an encoding error if the claims cannot be serialized.
pub fn encode_unsigned<T: Serialize>(
    claims: T,
    options: &EncodeOptions<'_>,
    secret: String,
) -> Result<EncodedParts, CodecError> {
    let payload = serde_json::to_vec(&claim_set(claims, options))
        .map_err(|e| CodecError::encoding(e.to_string()))?;

    Ok(EncodedParts {
        header: URL_SAFE_NO_PAD.encode(NONE_HEADER),
        payload: URL_SAFE_NO_PAD.encode(payload),
        signature: secret,
    })
}

/// Encodes and signs `claims` with `key`.
///
/// # Errors
/// Returns an encoding error if serialization or signing fails.
pub fn encode_signed<T: Serialize>(
    claims: T,
    key: &IntegrityKey,
    options: &EncodeOptions<'_>,
) -> Result<EncodedParts, CodecError> {
    let mut header = Header::new(key.algorithm.to_jwt_algorithm());
    header.kid = Some(key.kid.clone());

    let compact = jsonwebtoken::encode(&header, &claim_set(claims, options), key.encoding_key())
        .map_err(|e| CodecError::encoding(e.to_string()))?;

    EncodedParts::from_compact(&compact)
}

/// Parses the parts without verifying anything.
///
/// Never a source of trust on its own.
///
/// # Errors
/// Returns a decoding error if a part is not base64url JSON.
pub fn decode<T: DeserializeOwned>(parts: &EncodedParts) -> Result<ClaimSet<T>, CodecError> {
    let header = URL_SAFE_NO_PAD
        .decode(&parts.header)
        .map_err(|e| CodecError::decoding(format!("header: {e}")))?;
    serde_json::from_slice::<serde_json::Value>(&header)
        .map_err(|e| CodecError::decoding(format!("header: {e}")))?;

    let payload = URL_SAFE_NO_PAD
        .decode(&parts.payload)
        .map_err(|e| CodecError::decoding(format!("payload: {e}")))?;
    serde_json::from_slice(&payload).map_err(|e| CodecError::decoding(format!("payload: {e}")))
}

/// Checks the standard claims of an already decoded claim set.
///
/// # Errors
/// Returns `InvalidClaims` on issuer mismatch and `Expired` once `exp` is
/// reached, unless expiration is ignored.
pub fn assert_payload<T>(
    claim_set: &ClaimSet<T>,
    options: &VerifyOptions<'_>,
) -> Result<(), CodecError> {
    if claim_set.iss != options.issuer {
        return Err(CodecError::invalid_claims(format!(
            "unexpected iss value: {}",
            claim_set.iss
        )));
    }

    if !options.ignore_expiration && claim_set.exp.is_some_and(|exp| exp <= options.now) {
        return Err(CodecError::Expired);
    }

    Ok(())
}

/// Verifies a compact signed token against the keystore.
///
/// The verification key is chosen by the `kid` header and the signature must
/// use that key's algorithm.
///
/// # Errors
/// Returns a validation error on unknown key, bad signature, wrong issuer or
/// expiration.
pub fn verify<T: DeserializeOwned>(
    compact: &str,
    keystore: &IntegrityKeystore,
    options: &VerifyOptions<'_>,
) -> Result<ClaimSet<T>, CodecError> {
    let header = jsonwebtoken::decode_header(compact)?;
    let kid = header
        .kid
        .ok_or_else(|| CodecError::invalid_claims("missing kid header"))?;
    let key = keystore
        .find(&kid)
        .ok_or_else(|| CodecError::key_not_found(&kid))?;

    // Time-based claims are checked against the injected clock below.
    let mut validation = Validation::new(key.algorithm.to_jwt_algorithm());
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claim_set =
        jsonwebtoken::decode::<ClaimSet<T>>(compact, key.decoding_key(), &validation)?.claims;
    assert_payload(&claim_set, options)?;

    Ok(claim_set)
}
