#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use grantseal::{
    AdapterFactory, EventBroadcaster, FixedClock, IntegrityKey, IntegrityKeystore, StoredRecord,
    TokenAdapter, TokenClaims, TokenKind, TokenResult, TokenService,
};
use grantseal_memory::MemoryAdapter;
use papaya::HashMap as PapayaHashMap;

pub const ISSUER: &str = "https://op.example.com";
pub const NOW: i64 = 1_700_000_000;
pub const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

/// Memory adapter that counts calls.
pub struct SpyAdapter {
    pub inner: MemoryAdapter,
    pub finds: AtomicUsize,
    pub upserts: AtomicUsize,
}

impl SpyAdapter {
    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenAdapter for SpyAdapter {
    async fn upsert(&self, id: &str, record: StoredRecord, ttl: Option<u64>) -> TokenResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(id, record, ttl).await
    }

    async fn find(&self, id: &str) -> TokenResult<Option<StoredRecord>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(id).await
    }

    async fn destroy(&self, id: &str) -> TokenResult<()> {
        self.inner.destroy(id).await
    }

    async fn consume(&self, id: &str) -> TokenResult<()> {
        self.inner.consume(id).await
    }

    async fn revoke_by_grant_id(&self, grant_id: &str) -> TokenResult<u64> {
        self.inner.revoke_by_grant_id(grant_id).await
    }
}

/// Factory handing out spies over memory adapters on a shared clock.
pub struct SpyFactory {
    clock: Arc<FixedClock>,
    created: PapayaHashMap<TokenKind, Arc<SpyAdapter>>,
}

impl SpyFactory {
    pub fn new(clock: Arc<FixedClock>) -> Self {
        Self {
            clock,
            created: PapayaHashMap::new(),
        }
    }

    pub fn spy(&self, kind: TokenKind) -> Arc<SpyAdapter> {
        self.created
            .pin()
            .get(&kind)
            .cloned()
            .expect("adapter not created yet")
    }
}

impl AdapterFactory for SpyFactory {
    fn create(&self, kind: TokenKind) -> Arc<dyn TokenAdapter> {
        let spy = Arc::new(SpyAdapter {
            inner: MemoryAdapter::with_clock(kind, self.clock.clone()),
            finds: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
        });
        self.created.pin().insert(kind, spy.clone());
        spy
    }
}

pub struct Harness {
    pub service: TokenService,
    pub factory: Arc<SpyFactory>,
    pub clock: Arc<FixedClock>,
    pub events: Arc<EventBroadcaster>,
}

impl Harness {
    /// Service using the plain encoding for every kind.
    pub fn plain() -> Self {
        let clock = Arc::new(FixedClock::new(NOW));
        let factory = Arc::new(SpyFactory::new(clock.clone()));
        let events = EventBroadcaster::new_shared();
        let service = TokenService::new(ISSUER, factory.clone())
            .with_clock(clock.clone())
            .with_events(events.clone());

        Self {
            service,
            factory,
            clock,
            events,
        }
    }

    /// Service using the checksum encoding for every kind.
    pub fn integrity(key: IntegrityKey) -> Self {
        let keystore = Arc::new(IntegrityKeystore::new(vec![key]).unwrap());
        let mut harness = Self::plain();
        harness.service = harness.service.with_integrity(keystore);
        harness
    }

    pub fn hmac() -> Self {
        Self::integrity(IntegrityKey::from_secret("integrity", SECRET).unwrap())
    }

    pub fn spy(&self, kind: TokenKind) -> Arc<SpyAdapter> {
        self.factory.spy(kind)
    }
}

/// Decodes a base64url JSON segment.
pub fn decode_segment(segment: &str) -> serde_json::Value {
    let bytes = URL_SAFE_NO_PAD.decode(segment).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Encodes a JSON value as a base64url segment.
pub fn encode_segment(value: &serde_json::Value) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
}

/// Claims with every field set, including nested JSON under `claims`.
pub fn full_claims() -> TokenClaims {
    TokenClaims {
        account_id: Some("account".to_string()),
        acr: Some("urn:mace:incommon:iap:silver".to_string()),
        amr: Some(vec!["pwd".to_string(), "otp".to_string()]),
        auth_time: Some(NOW - 120),
        claims: Some(serde_json::json!({
            "userinfo": { "email": { "essential": true } },
            "id_token": { "acr": { "values": ["urn:mace:incommon:iap:silver"] } },
        })),
        client_id: Some("client".to_string()),
        code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
        code_challenge_method: Some("S256".to_string()),
        grant_id: Some("foo".to_string()),
        nonce: Some("n-0S6_WzA2Mj".to_string()),
        redirect_uri: Some("https://rp.example.com/cb".to_string()),
        scope: Some("openid email offline_access".to_string()),
        sid: Some("session".to_string()),
    }
}
