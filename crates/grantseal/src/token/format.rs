//! Encoding strategies.
//!
//! A [`TokenFormat`] decides how a token becomes a stored record plus an
//! opaque value, and how a presented value is checked against the stored
//! record. [`PlainFormat`](super::PlainFormat) carries a random bearer
//! secret in an unsigned envelope; [`ChecksumFormat`](super::ChecksumFormat)
//! signs the payload and binds a never-stored checksum-secret into it.

use std::fmt;

use crate::TokenResult;
use crate::codec::{EncodeOptions, EncodedParts, VerifyOptions};
use crate::storage::StoredRecord;
use crate::token::kind::TokenKind;
use crate::token::model::{Token, TokenPayload};

/// A presented opaque value split into its segments.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Presented<'a> {
    /// Storage key.
    pub jti: &'a str,
    /// Checksum-secret segment (checksum encoding only).
    pub checksum_secret: Option<&'a str>,
    /// Trailing segment compared with the stored signature.
    pub signature: &'a str,
}

impl fmt::Debug for Presented<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presented")
            .field("jti", &self.jti)
            .finish_non_exhaustive()
    }
}

/// Result of encoding a token for issuance.
pub struct Issued {
    /// Parts to persist.
    pub parts: EncodedParts,
    /// Opaque value returned to the caller, never stored.
    pub value: String,
}

impl fmt::Debug for Issued {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issued")
            .field("parts", &self.parts)
            .finish_non_exhaustive()
    }
}

/// Encoding strategy of a token kind.
pub trait TokenFormat: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Encodes `payload` and builds the opaque value.
    ///
    /// # Errors
    /// Returns an error if randomness, serialization or signing fails.
    fn encode(&self, payload: TokenPayload, options: &EncodeOptions<'_>) -> TokenResult<Issued>;

    /// Splits a presented value.
    ///
    /// `Ok(None)` means "treat as not found"; an error means the value is
    /// malformed. Either way no adapter lookup happens.
    ///
    /// # Errors
    /// Returns `Malformed` for strategies that report structural problems.
    fn parse<'a>(&self, value: &'a str) -> TokenResult<Option<Presented<'a>>>;

    /// Checks a presented value against the stored record and rebuilds the
    /// token on success.
    ///
    /// # Errors
    /// Returns `InvalidToken` for strategies that report integrity failures.
    fn validate(
        &self,
        kind: TokenKind,
        presented: &Presented<'_>,
        record: &StoredRecord,
        options: &VerifyOptions<'_>,
    ) -> TokenResult<Option<Token>>;
}
