//! Token data model.

use serde::{Deserialize, Serialize};

use crate::TokenResult;
use crate::codec::ClaimSet;
use crate::error::TokenError;
use crate::token::kind::TokenKind;
use crate::token::secret::generate_jti;

/// Claim fields carried through encoding.
///
/// These are the only fields that ever reach the payload; everything else
/// on a [`Token`] stays in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Account (subject) identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Authentication context class reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication methods references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amr: Option<Vec<String>>,

    /// Time of the end-user authentication (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Requested claims blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<serde_json::Value>,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// PKCE code challenge (authorization codes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method (authorization codes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// Owning grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,

    /// OpenID Connect nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Redirect URI bound to an authorization code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Space separated scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Session identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// Token-specific part of an encoded payload.
///
/// The codec wraps it with `iss`, `iat` and `exp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// Token identifier.
    pub jti: String,

    /// Kind tag. Kept as a string so a foreign tag is reported, not rejected
    /// by the parser.
    pub kind: String,

    /// Claim fields.
    #[serde(flatten)]
    pub claims: TokenClaims,

    /// One-way hash of the checksum-secret (checksum encoding only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Consumption marker as persisted by an adapter.
///
/// Adapters may store a plain flag or the epoch second of consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsumedMarker {
    /// Boolean flag.
    Flag(bool),
    /// Consumption time (Unix timestamp).
    At(i64),
}

impl ConsumedMarker {
    /// Returns `true` if the marker means "consumed".
    #[must_use]
    pub fn is_consumed(self) -> bool {
        match self {
            Self::Flag(consumed) => consumed,
            Self::At(_) => true,
        }
    }
}

/// A live token instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,

    /// Token identifier, the storage key.
    pub jti: String,

    /// Claim fields.
    pub claims: TokenClaims,

    /// Issued at, known once saved or found.
    pub iat: Option<i64>,

    /// Expiration, known once saved or found. `None` never expires.
    pub exp: Option<i64>,

    /// Lifetime override in seconds; wins over the kind's configured TTL.
    pub expires_in: Option<i64>,

    /// Consumption marker; `None` means never consumed.
    pub consumed: Option<ConsumedMarker>,
}

impl Token {
    /// Creates a token of `kind` with a fresh identifier.
    ///
    /// # Errors
    /// Returns an internal error if the entropy source fails.
    pub fn new(kind: TokenKind, claims: TokenClaims) -> TokenResult<Self> {
        Ok(Self {
            kind,
            jti: generate_jti()?,
            claims,
            iat: None,
            exp: None,
            expires_in: None,
            consumed: None,
        })
    }

    /// Rebuilds a token of `kind` from a decoded payload.
    ///
    /// An empty `jti` is replaced with a fresh one.
    ///
    /// # Errors
    /// Returns `KindMismatch` if the payload's kind tag is not `kind`.
    pub fn from_payload(kind: TokenKind, payload: TokenPayload) -> TokenResult<Self> {
        if payload.kind != kind.name() {
            return Err(TokenError::kind_mismatch(kind.name(), payload.kind));
        }

        let jti = if payload.jti.is_empty() {
            generate_jti()?
        } else {
            payload.jti
        };

        Ok(Self {
            kind,
            jti,
            claims: payload.claims,
            iat: None,
            exp: None,
            expires_in: None,
            consumed: None,
        })
    }

    /// Rebuilds a token from a verified or decoded claim set.
    ///
    /// # Errors
    /// Returns `KindMismatch` if the payload's kind tag is not `kind`.
    pub fn from_claim_set(kind: TokenKind, claim_set: ClaimSet<TokenPayload>) -> TokenResult<Self> {
        let mut token = Self::from_payload(kind, claim_set.claims)?;
        token.iat = Some(claim_set.iat);
        token.exp = claim_set.exp;
        Ok(token)
    }

    /// Sets a lifetime override.
    #[must_use]
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Returns the token kind.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns the owning grant, if any.
    #[must_use]
    pub fn grant_id(&self) -> Option<&str> {
        self.claims.grant_id.as_deref()
    }

    /// Returns `true` once the token has been consumed.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed.is_some_and(ConsumedMarker::is_consumed)
    }

    /// Returns `true` if `exp` has been reached.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }

    /// Returns `true` if the token is neither expired nor consumed.
    #[must_use]
    pub fn is_valid(&self, now: i64) -> bool {
        !self.is_consumed() && !self.is_expired(now)
    }

    /// Builds the payload written by the codec.
    #[must_use]
    pub fn payload(&self) -> TokenPayload {
        TokenPayload {
            jti: self.jti.clone(),
            kind: self.kind.name().to_string(),
            claims: self.claims.clone(),
            checksum: None,
        }
    }
}
