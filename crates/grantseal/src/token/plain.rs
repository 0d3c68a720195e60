//! Plain encoding: unsigned envelope plus a random bearer secret.
//!
//! The opaque value is `jti ‖ secret`. The secret is stored as the record's
//! signature and is the only unforgeability guarantee, so every failure is
//! reported as "not found".

use crate::TokenResult;
use crate::codec::{self, ClaimSet, EncodeOptions, VerifyOptions};
use crate::storage::StoredRecord;
use crate::token::format::{Issued, Presented, TokenFormat};
use crate::token::kind::TokenKind;
use crate::token::model::{Token, TokenPayload};
use crate::token::secret::{JTI_LENGTH, SECRET_BYTES, constant_time_eq, random_base64url};

/// Unsigned encoding with a 64 byte bearer secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormat;

impl TokenFormat for PlainFormat {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn encode(&self, payload: TokenPayload, options: &EncodeOptions<'_>) -> TokenResult<Issued> {
        let secret = random_base64url(SECRET_BYTES)?;
        let value = format!("{}{}", payload.jti, secret);
        let parts = codec::encode_unsigned(payload, options, secret)?;
        Ok(Issued { parts, value })
    }

    fn parse<'a>(&self, value: &'a str) -> TokenResult<Option<Presented<'a>>> {
        let (Some(jti), Some(signature)) = (value.get(..JTI_LENGTH), value.get(JTI_LENGTH..)) else {
            return Ok(None);
        };
        if signature.is_empty() {
            return Ok(None);
        }

        Ok(Some(Presented {
            jti,
            checksum_secret: None,
            signature,
        }))
    }

    fn validate(
        &self,
        kind: TokenKind,
        presented: &Presented<'_>,
        record: &StoredRecord,
        options: &VerifyOptions<'_>,
    ) -> TokenResult<Option<Token>> {
        if !constant_time_eq(presented.signature, &record.signature) {
            tracing::warn!(kind = %kind, jti = presented.jti, "token signature mismatch");
            return Ok(None);
        }

        let claim_set: ClaimSet<TokenPayload> = match codec::decode(&record.parts()) {
            Ok(claim_set) => claim_set,
            Err(e) => {
                tracing::warn!(kind = %kind, jti = presented.jti, reason = %e, "stored token undecodable");
                return Ok(None);
            }
        };

        if let Err(e) = codec::assert_payload(&claim_set, options) {
            tracing::debug!(kind = %kind, jti = presented.jti, reason = %e, "token rejected");
            return Ok(None);
        }

        match Token::from_claim_set(kind, claim_set) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(kind = %kind, jti = presented.jti, reason = %e, "stored token rejected");
                Ok(None)
            }
        }
    }
}
