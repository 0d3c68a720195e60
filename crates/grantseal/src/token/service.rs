//! Token lifecycle service.
//!
//! Drives `save`, `find`, `destroy` and `consume` for every token kind:
//! the kind's [`TokenFormat`] encodes and validates, the kind's adapter
//! persists, and lifecycle events go to the configured [`EventSink`].
//!
//! # Usage
//!
//! ```ignore
//! use grantseal::token::{Token, TokenClaims, TokenKind, TokenService, FindOptions};
//!
//! let service = TokenService::new("https://op.example.com", factory)
//!     .with_integrity(keystore);
//!
//! let mut token = Token::new(TokenKind::AccessToken, claims)?;
//! let value = service.save(&mut token).await?;
//! let found = service.find(TokenKind::AccessToken, &value, FindOptions::default()).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::TokenResult;
use crate::clock::{Clock, SystemClock};
use crate::codec::{self, ClaimSet, EncodeOptions, VerifyOptions};
use crate::config::{GrantsealConfig, TtlConfig};
use crate::error::TokenError;
use crate::events::{EventSink, NoopSink, TokenEvent};
use crate::keystore::{IntegrityKeystore, MISSING_SIGNING_KEY};
use crate::storage::{AdapterFactory, AdapterRegistry, StoredRecord};
use crate::token::checksum::ChecksumFormat;
use crate::token::format::TokenFormat;
use crate::token::kind::TokenKind;
use crate::token::model::{ConsumedMarker, Token, TokenPayload};
use crate::token::plain::PlainFormat;

/// Options of a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Accept tokens whose `exp` has passed.
    pub ignore_expiration: bool,
}

impl FindOptions {
    /// Options that accept expired tokens.
    #[must_use]
    pub fn ignoring_expiration() -> Self {
        Self {
            ignore_expiration: true,
        }
    }
}

/// Token lifecycle service.
pub struct TokenService {
    /// Issuer written to and expected in `iss`.
    issuer: String,

    /// Per-kind storage adapters.
    adapters: AdapterRegistry,

    /// Time source.
    clock: Arc<dyn Clock>,

    /// Lifecycle notifications.
    events: Arc<dyn EventSink>,

    /// Per-kind lifetimes.
    ttl: TtlConfig,

    /// Integrity keys, when provisioned.
    keystore: Option<Arc<IntegrityKeystore>>,

    /// Encoding strategy per kind, indexed by [`TokenKind::index`].
    formats: [Arc<dyn TokenFormat>; TokenKind::ALL.len()],
}

impl TokenService {
    /// Creates a service using the plain encoding for every kind, the system
    /// clock, default lifetimes and no event listeners.
    pub fn new(issuer: impl Into<String>, factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            issuer: issuer.into(),
            adapters: AdapterRegistry::new(factory),
            clock: Arc::new(SystemClock),
            events: Arc::new(NoopSink),
            ttl: TtlConfig::default(),
            keystore: None,
            formats: std::array::from_fn(|_| Arc::new(PlainFormat) as Arc<dyn TokenFormat>),
        }
    }

    /// Creates a service from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `features.token_integrity` is on and
    /// no keystore is given, so a misconfigured server fails at startup.
    pub fn from_config(
        config: &GrantsealConfig,
        factory: Arc<dyn AdapterFactory>,
        keystore: Option<Arc<IntegrityKeystore>>,
    ) -> TokenResult<Self> {
        let service = Self::new(config.issuer.clone(), factory).with_ttl(config.ttl.clone());

        match (config.features.token_integrity, keystore) {
            (true, Some(keystore)) => Ok(service.with_integrity(keystore)),
            (true, None) => Err(TokenError::configuration(MISSING_SIGNING_KEY)),
            (false, Some(keystore)) => Ok(service.with_keystore(keystore)),
            (false, None) => Ok(service),
        }
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the per-kind lifetimes.
    #[must_use]
    pub fn with_ttl(mut self, ttl: TtlConfig) -> Self {
        self.ttl = ttl;
        self
    }

    /// Provides integrity keys without changing any kind's encoding.
    /// Needed by [`TokenService::from_jwt`].
    #[must_use]
    pub fn with_keystore(mut self, keystore: Arc<IntegrityKeystore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// Switches every kind to the checksum encoding over `keystore`.
    #[must_use]
    pub fn with_integrity(mut self, keystore: Arc<IntegrityKeystore>) -> Self {
        let format: Arc<dyn TokenFormat> = Arc::new(ChecksumFormat::new(Arc::clone(&keystore)));
        self.formats = std::array::from_fn(|_| Arc::clone(&format));
        self.keystore = Some(keystore);
        self
    }

    /// Overrides the encoding of a single kind.
    #[must_use]
    pub fn with_format(mut self, kind: TokenKind, format: Arc<dyn TokenFormat>) -> Self {
        self.formats[kind.index()] = format;
        self
    }

    /// Returns the issuer.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the adapter registry.
    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// Returns the integrity keystore, if any.
    pub fn keystore(&self) -> Option<&IntegrityKeystore> {
        self.keystore.as_deref()
    }

    /// Returns the encoding strategy of `kind`.
    pub fn format(&self, kind: TokenKind) -> &dyn TokenFormat {
        self.formats[kind.index()].as_ref()
    }

    /// Current epoch seconds from the configured clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Lifetime of `token` in seconds: the instance override, else the
    /// kind's configured TTL, else none.
    pub fn resolve_ttl(&self, token: &Token) -> Option<i64> {
        token.expires_in.or_else(|| {
            self.ttl
                .ttl_for(token.kind())
                .map(|ttl| i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
        })
    }

    /// Returns `true` if `token` is neither expired nor consumed now.
    pub fn is_valid(&self, token: &Token) -> bool {
        token.is_valid(self.now())
    }

    /// Encodes and persists `token`, returning the opaque value.
    ///
    /// On success `iat` and `exp` are set on `token`. The opaque value is
    /// returned once and never stored.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the adapter write fails. Nothing is
    /// retried.
    pub async fn save(&self, token: &mut Token) -> TokenResult<String> {
        let kind = token.kind();
        let now = self.now();
        let expires_in = self.resolve_ttl(token);
        let format = self.format(kind);

        let options = EncodeOptions {
            issuer: &self.issuer,
            expires_in,
            now,
        };
        let issued = format.encode(token.payload(), &options)?;

        let record = StoredRecord::new(issued.parts, token.claims.grant_id.clone());
        let ttl = expires_in.map(|seconds| u64::try_from(seconds).unwrap_or(0));
        self.adapters
            .adapter(kind)
            .upsert(&token.jti, record, ttl)
            .await?;

        token.iat = Some(now);
        token.exp = expires_in.map(|seconds| now.saturating_add(seconds));

        tracing::debug!(
            kind = %kind,
            jti = %token.jti,
            grant_id = ?token.grant_id(),
            format = format.name(),
            "token issued"
        );
        self.events.emit(TokenEvent::Issued {
            kind,
            jti: token.jti.clone(),
            grant_id: token.claims.grant_id.clone(),
        });

        Ok(issued.value)
    }

    /// Finds a token of `kind` by its opaque value.
    ///
    /// Returns `Ok(None)` when the value is unknown. With the checksum
    /// encoding a malformed value is `Err(Malformed)` (no adapter call) and
    /// a failed integrity check is `Err(InvalidToken)`; the plain encoding
    /// reports both as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error on rejection (checksum encoding) or if the adapter
    /// fails.
    pub async fn find(
        &self,
        kind: TokenKind,
        value: &str,
        options: FindOptions,
    ) -> TokenResult<Option<Token>> {
        let format = self.format(kind);

        let Some(presented) = format.parse(value)? else {
            tracing::debug!(kind = %kind, "token value not parseable");
            return Ok(None);
        };

        let Some(record) = self.adapters.adapter(kind).find(presented.jti).await? else {
            tracing::debug!(kind = %kind, jti = presented.jti, "token not found");
            return Ok(None);
        };

        let verify = VerifyOptions {
            issuer: &self.issuer,
            ignore_expiration: options.ignore_expiration,
            now: self.now(),
        };
        let Some(mut token) = format.validate(kind, &presented, &record, &verify)? else {
            return Ok(None);
        };

        if let Some(consumed) = record.consumed {
            token.consumed = Some(consumed);
        }

        Ok(Some(token))
    }

    /// Rebuilds a token from a standalone signed value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error without a keystore, `InvalidToken` if
    /// verification fails or the payload is of another kind.
    pub fn from_jwt(&self, kind: TokenKind, compact: &str, options: FindOptions) -> TokenResult<Token> {
        let keystore = self
            .keystore
            .as_deref()
            .ok_or_else(|| TokenError::configuration(MISSING_SIGNING_KEY))?;

        let verify = VerifyOptions {
            issuer: &self.issuer,
            ignore_expiration: options.ignore_expiration,
            now: self.now(),
        };
        let claim_set: ClaimSet<TokenPayload> =
            codec::verify(compact, keystore, &verify).map_err(|e| {
                tracing::warn!(kind = %kind, reason = %e, "signed token rejected");
                TokenError::invalid_token(format!("verification failed: {e}"))
            })?;

        Token::from_claim_set(kind, claim_set).map_err(|e| match e {
            TokenError::KindMismatch { .. } => {
                tracing::warn!(kind = %kind, reason = %e, "signed token rejected");
                TokenError::invalid_token(format!("kind mismatch: {e}"))
            }
            e => e,
        })
    }

    /// Destroys `token`.
    ///
    /// Emits `token.revoked` and, for tokens with a grant, `grant.revoked`
    /// before the delete is issued.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter delete fails.
    pub async fn destroy(&self, token: &Token) -> TokenResult<()> {
        let kind = token.kind();

        self.events.emit(TokenEvent::Revoked {
            kind,
            jti: token.jti.clone(),
            grant_id: token.claims.grant_id.clone(),
        });
        if let Some(grant_id) = &token.claims.grant_id {
            self.events.emit(TokenEvent::GrantRevoked {
                grant_id: grant_id.clone(),
            });
        }

        tracing::debug!(kind = %kind, jti = %token.jti, grant_id = ?token.grant_id(), "token revoked");
        self.adapters.adapter(kind).destroy(&token.jti).await
    }

    /// Marks `token` as used. The record stays findable with `consumed` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter update fails.
    pub async fn consume(&self, token: &mut Token) -> TokenResult<()> {
        let kind = token.kind();

        self.events.emit(TokenEvent::Consumed {
            kind,
            jti: token.jti.clone(),
            grant_id: token.claims.grant_id.clone(),
        });

        self.adapters.adapter(kind).consume(&token.jti).await?;
        token.consumed = Some(ConsumedMarker::At(self.now()));

        tracing::debug!(kind = %kind, jti = %token.jti, "token consumed");
        Ok(())
    }

    /// Deletes every token issued under `grant_id`, across all kinds.
    ///
    /// Returns the number of records the adapters removed.
    ///
    /// # Errors
    ///
    /// Returns the first adapter error.
    pub async fn revoke_grant(&self, grant_id: &str) -> TokenResult<u64> {
        self.events.emit(TokenEvent::GrantRevoked {
            grant_id: grant_id.to_string(),
        });

        let mut revoked = 0;
        for kind in TokenKind::ALL {
            revoked += self
                .adapters
                .adapter(kind)
                .revoke_by_grant_id(grant_id)
                .await?;
        }

        tracing::debug!(grant_id, revoked, "grant revoked");
        Ok(revoked)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("adapters", &self.adapters)
            .field("ttl", &self.ttl)
            .field("keystore", &self.keystore)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Mutex, RwLock};

    use async_trait::async_trait;

    use super::*;
    use crate::clock::FixedClock;
    use crate::keystore::IntegrityKey;
    use crate::storage::TokenAdapter;
    use crate::token::model::TokenClaims;

    const ISSUER: &str = "https://op.example.com";
    const NOW: i64 = 1_700_000_000;

    #[derive(Default)]
    struct MockAdapter {
        records: RwLock<HashMap<String, StoredRecord>>,
    }

    #[async_trait]
    impl TokenAdapter for MockAdapter {
        async fn upsert(&self, id: &str, record: StoredRecord, _: Option<u64>) -> TokenResult<()> {
            self.records.write().unwrap().insert(id.to_string(), record);
            Ok(())
        }

        async fn find(&self, id: &str) -> TokenResult<Option<StoredRecord>> {
            Ok(self.records.read().unwrap().get(id).cloned())
        }

        async fn destroy(&self, id: &str) -> TokenResult<()> {
            self.records.write().unwrap().remove(id);
            Ok(())
        }

        async fn consume(&self, id: &str) -> TokenResult<()> {
            if let Some(record) = self.records.write().unwrap().get_mut(id) {
                record.consumed = Some(ConsumedMarker::Flag(true));
            }
            Ok(())
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl TokenAdapter for FailingAdapter {
        async fn upsert(&self, _: &str, _: StoredRecord, _: Option<u64>) -> TokenResult<()> {
            Err(TokenError::storage("unavailable"))
        }

        async fn find(&self, _: &str) -> TokenResult<Option<StoredRecord>> {
            Err(TokenError::storage("unavailable"))
        }

        async fn destroy(&self, _: &str) -> TokenResult<()> {
            Err(TokenError::storage("unavailable"))
        }

        async fn consume(&self, _: &str) -> TokenResult<()> {
            Err(TokenError::storage("unavailable"))
        }
    }

    struct MockFactory;

    impl AdapterFactory for MockFactory {
        fn create(&self, _kind: TokenKind) -> Arc<dyn TokenAdapter> {
            Arc::new(MockAdapter::default())
        }
    }

    struct FailingFactory;

    impl AdapterFactory for FailingFactory {
        fn create(&self, _kind: TokenKind) -> Arc<dyn TokenAdapter> {
            Arc::new(FailingAdapter)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TokenEvent>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(TokenEvent::name).collect()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: TokenEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn keystore() -> Arc<IntegrityKeystore> {
        let key = IntegrityKey::from_secret("k1", b"0123456789abcdef0123456789abcdef").unwrap();
        Arc::new(IntegrityKeystore::new(vec![key]).unwrap())
    }

    fn service(clock: Arc<FixedClock>, sink: Arc<RecordingSink>) -> TokenService {
        TokenService::new(ISSUER, Arc::new(MockFactory))
            .with_clock(clock)
            .with_events(sink)
    }

    fn claims() -> TokenClaims {
        TokenClaims {
            account_id: Some("account".to_string()),
            grant_id: Some("foo".to_string()),
            scope: Some("openid".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_plain_round_trip() {
        let clock = Arc::new(FixedClock::new(NOW));
        let sink = Arc::new(RecordingSink::default());
        let service = service(clock, sink.clone());

        let mut token = Token::new(TokenKind::AccessToken, claims()).unwrap();
        let value = service.save(&mut token).await.unwrap();
        assert_eq!(token.iat, Some(NOW));
        assert_eq!(token.exp, Some(NOW + 3600));

        let found = service
            .find(TokenKind::AccessToken, &value, FindOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.jti, token.jti);
        assert_eq!(found.claims, token.claims);
        assert!(service.is_valid(&found));
        assert_eq!(sink.names(), ["token.issued"]);
    }

    #[tokio::test]
    async fn test_checksum_round_trip() {
        let clock = Arc::new(FixedClock::new(NOW));
        let sink = Arc::new(RecordingSink::default());
        let service = service(clock, sink).with_integrity(keystore());
        assert_eq!(service.format(TokenKind::RefreshToken).name(), "checksum");

        let mut token = Token::new(TokenKind::RefreshToken, claims()).unwrap();
        let value = service.save(&mut token).await.unwrap();

        let found = service
            .find(TokenKind::RefreshToken, &value, FindOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.claims, token.claims);
        assert_eq!(found.exp, token.exp);
    }

    #[tokio::test]
    async fn test_ttl_resolution() {
        let clock = Arc::new(FixedClock::new(NOW));
        let service = service(clock, Arc::new(RecordingSink::default()));

        let token = Token::new(TokenKind::AccessToken, claims()).unwrap();
        assert_eq!(service.resolve_ttl(&token), Some(3600));
        assert_eq!(service.resolve_ttl(&token.with_expires_in(5)), Some(5));

        let mut token = Token::new(TokenKind::InitialAccessToken, claims()).unwrap();
        assert_eq!(service.resolve_ttl(&token), None);
        service.save(&mut token).await.unwrap();
        assert_eq!(token.exp, None);
    }

    #[tokio::test]
    async fn test_expiration_and_ignore_expiration() {
        let clock = Arc::new(FixedClock::new(NOW));
        let service = service(clock.clone(), Arc::new(RecordingSink::default()));

        let mut token = Token::new(TokenKind::AuthorizationCode, claims())
            .unwrap()
            .with_expires_in(60);
        let value = service.save(&mut token).await.unwrap();

        clock.advance(60);
        let expired = service
            .find(TokenKind::AuthorizationCode, &value, FindOptions::default())
            .await
            .unwrap();
        assert!(expired.is_none());

        let found = service
            .find(
                TokenKind::AuthorizationCode,
                &value,
                FindOptions::ignoring_expiration(),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!service.is_valid(&found));
    }

    #[tokio::test]
    async fn test_consume_is_final() {
        let clock = Arc::new(FixedClock::new(NOW));
        let sink = Arc::new(RecordingSink::default());
        let service = service(clock, sink.clone());

        let mut token = Token::new(TokenKind::AuthorizationCode, claims()).unwrap();
        let value = service.save(&mut token).await.unwrap();
        service.consume(&mut token).await.unwrap();
        assert!(!service.is_valid(&token));

        let found = service
            .find(TokenKind::AuthorizationCode, &value, FindOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.consumed, Some(ConsumedMarker::Flag(true)));
        assert!(!service.is_valid(&found));
        assert_eq!(sink.names(), ["token.issued", "token.consumed"]);
    }

    #[tokio::test]
    async fn test_destroy_emits_then_deletes() {
        let clock = Arc::new(FixedClock::new(NOW));
        let sink = Arc::new(RecordingSink::default());
        let service = service(clock, sink.clone());

        let mut token = Token::new(TokenKind::AccessToken, claims()).unwrap();
        let value = service.save(&mut token).await.unwrap();
        service.destroy(&token).await.unwrap();

        assert_eq!(
            sink.names(),
            ["token.issued", "token.revoked", "grant.revoked"]
        );
        let found = service
            .find(TokenKind::AccessToken, &value, FindOptions::default())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_destroy_without_grant() {
        let clock = Arc::new(FixedClock::new(NOW));
        let sink = Arc::new(RecordingSink::default());
        let service = service(clock, sink.clone());

        let mut token = Token::new(TokenKind::ClientCredentials, TokenClaims::default()).unwrap();
        service.save(&mut token).await.unwrap();
        service.destroy(&token).await.unwrap();

        assert_eq!(sink.names(), ["token.issued", "token.revoked"]);
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let service = TokenService::new(ISSUER, Arc::new(FailingFactory));

        let mut token = Token::new(TokenKind::AccessToken, claims()).unwrap();
        let err = service.save(&mut token).await.unwrap_err();
        assert!(matches!(err, TokenError::Storage { .. }));

        let value = "a".repeat(100);
        let err = service
            .find(TokenKind::AccessToken, &value, FindOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "server_error");
    }

    #[tokio::test]
    async fn test_from_jwt() {
        let clock = Arc::new(FixedClock::new(NOW));
        let service = service(clock, Arc::new(RecordingSink::default())).with_integrity(keystore());

        let mut token = Token::new(TokenKind::AccessToken, claims()).unwrap();
        service.save(&mut token).await.unwrap();

        let record = service
            .adapters()
            .adapter(TokenKind::AccessToken)
            .find(&token.jti)
            .await
            .unwrap()
            .unwrap();
        let compact = record.parts().compact();

        let rebuilt = service
            .from_jwt(TokenKind::AccessToken, &compact, FindOptions::default())
            .unwrap();
        assert_eq!(rebuilt.jti, token.jti);

        let err = service
            .from_jwt(TokenKind::RefreshToken, &compact, FindOptions::default())
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { .. }));
        assert_eq!(err.oauth_error_code(), "invalid_token");
    }

    #[tokio::test]
    async fn test_from_jwt_requires_keystore() {
        let service = TokenService::new(ISSUER, Arc::new(MockFactory));
        let err = service
            .from_jwt(TokenKind::AccessToken, "a.b.c", FindOptions::default())
            .unwrap_err();
        assert!(matches!(err, TokenError::Configuration { .. }));
    }

    #[test]
    fn test_from_config_requires_keystore_for_integrity() {
        let mut config = GrantsealConfig::default();
        config.features.token_integrity = true;

        let err = TokenService::from_config(&config, Arc::new(MockFactory), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Configuration error: {MISSING_SIGNING_KEY}")
        );

        let service = TokenService::from_config(&config, Arc::new(MockFactory), Some(keystore()))
            .unwrap();
        assert_eq!(service.format(TokenKind::AccessToken).name(), "checksum");

        config.features.token_integrity = false;
        let service = TokenService::from_config(&config, Arc::new(MockFactory), Some(keystore()))
            .unwrap();
        assert_eq!(service.format(TokenKind::AccessToken).name(), "plain");
        assert!(service.keystore().is_some());
    }

    #[test]
    fn test_with_format_overrides_one_kind() {
        let service = TokenService::new(ISSUER, Arc::new(MockFactory))
            .with_format(TokenKind::RefreshToken, Arc::new(ChecksumFormat::new(keystore())));

        assert_eq!(service.format(TokenKind::RefreshToken).name(), "checksum");
        assert_eq!(service.format(TokenKind::AccessToken).name(), "plain");
    }
}
