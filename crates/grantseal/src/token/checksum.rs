//! Checksum encoding: signed payload plus a never-stored checksum-secret.
//!
//! The opaque value is `jti ‖ checksum-secret ‖ signature`. Only the hash of
//! the checksum-secret is embedded in the signed payload, so a dump of the
//! stored records cannot be turned back into a usable value.
//!
//! Lookup distinguishes three outcomes:
//!
//! - `Err(Malformed)`: wrong segment layout, raised before any adapter call
//! - `Ok(None)`: well-formed value whose `jti` is unknown
//! - `Err(InvalidToken)`: signature mismatch, failed verification or
//!   checksum mismatch

use std::sync::Arc;

use crate::TokenResult;
use crate::codec::{self, ClaimSet, EncodeOptions, VerifyOptions};
use crate::error::TokenError;
use crate::keystore::IntegrityKeystore;
use crate::storage::StoredRecord;
use crate::token::format::{Issued, Presented, TokenFormat};
use crate::token::kind::TokenKind;
use crate::token::model::{Token, TokenPayload};
use crate::token::secret::{
    CHECKSUM_SECRET_BYTES, CHECKSUM_SECRET_LENGTH, JTI_LENGTH, checksum_hash, constant_time_eq,
    random_base64url,
};

/// Offset of the signature segment in an opaque value.
const SIGNATURE_OFFSET: usize = JTI_LENGTH + CHECKSUM_SECRET_LENGTH;

/// Signed encoding bound to a checksum-secret.
#[derive(Debug, Clone)]
pub struct ChecksumFormat {
    keystore: Arc<IntegrityKeystore>,
}

impl ChecksumFormat {
    /// Creates the strategy over an integrity keystore.
    pub fn new(keystore: Arc<IntegrityKeystore>) -> Self {
        Self { keystore }
    }

    /// Returns the keystore.
    pub fn keystore(&self) -> &IntegrityKeystore {
        &self.keystore
    }

    fn reject(kind: TokenKind, jti: &str, reason: String) -> TokenError {
        tracing::warn!(kind = %kind, jti, reason = %reason, "token integrity check failed");
        TokenError::invalid_token(reason)
    }
}

impl TokenFormat for ChecksumFormat {
    fn name(&self) -> &'static str {
        "checksum"
    }

    fn encode(&self, mut payload: TokenPayload, options: &EncodeOptions<'_>) -> TokenResult<Issued> {
        let checksum_secret = random_base64url(CHECKSUM_SECRET_BYTES)?;
        payload.checksum = Some(checksum_hash(&checksum_secret));

        let jti = payload.jti.clone();
        let parts = codec::encode_signed(payload, self.keystore.signing_key(), options)?;
        let value = format!("{jti}{checksum_secret}{}", parts.signature);

        Ok(Issued { parts, value })
    }

    fn parse<'a>(&self, value: &'a str) -> TokenResult<Option<Presented<'a>>> {
        let jti = value.get(..JTI_LENGTH);
        let checksum_secret = value.get(JTI_LENGTH..SIGNATURE_OFFSET);
        let signature = value.get(SIGNATURE_OFFSET..);

        match (jti, checksum_secret, signature) {
            (Some(jti), Some(checksum_secret), Some(signature)) if !signature.is_empty() => {
                Ok(Some(Presented {
                    jti,
                    checksum_secret: Some(checksum_secret),
                    signature,
                }))
            }
            _ => {
                tracing::debug!(length = value.len(), "malformed token value");
                Err(TokenError::Malformed)
            }
        }
    }

    fn validate(
        &self,
        kind: TokenKind,
        presented: &Presented<'_>,
        record: &StoredRecord,
        options: &VerifyOptions<'_>,
    ) -> TokenResult<Option<Token>> {
        let jti = presented.jti;

        if !constant_time_eq(presented.signature, &record.signature) {
            return Err(Self::reject(kind, jti, "signature mismatch".to_string()));
        }

        let claim_set: ClaimSet<TokenPayload> =
            codec::verify(&record.parts().compact(), &self.keystore, options)
                .map_err(|e| Self::reject(kind, jti, format!("verification failed: {e}")))?;

        let checksum_secret = presented.checksum_secret.ok_or(TokenError::Malformed)?;
        let matches = claim_set
            .claims
            .checksum
            .as_deref()
            .is_some_and(|checksum| constant_time_eq(&checksum_hash(checksum_secret), checksum));
        if !matches {
            return Err(Self::reject(kind, jti, "checksum mismatch".to_string()));
        }

        match Token::from_claim_set(kind, claim_set) {
            Ok(token) => Ok(Some(token)),
            Err(e @ TokenError::KindMismatch { .. }) => {
                Err(Self::reject(kind, jti, format!("kind mismatch: {e}")))
            }
            Err(e) => Err(e),
        }
    }
}
