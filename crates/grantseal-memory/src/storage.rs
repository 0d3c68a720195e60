use std::sync::Arc;

use async_trait::async_trait;
use grantseal::{Clock, ConsumedMarker, StoredRecord, SystemClock, TokenAdapter, TokenKind, TokenResult};
use papaya::HashMap as PapayaHashMap;

/// A record plus its absolute expiry.
#[derive(Debug, Clone)]
struct Entry {
    record: StoredRecord,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory token adapter using a papaya lock-free HashMap.
///
/// One instance serves one token kind. Expired entries read as absent; they
/// are dropped when read and swept on every write.
pub struct MemoryAdapter {
    kind: TokenKind,
    data: Arc<PapayaHashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryAdapter {
    /// Creates an empty adapter for `kind` on the system clock.
    pub fn new(kind: TokenKind) -> Self {
        Self::with_clock(kind, Arc::new(SystemClock))
    }

    /// Creates an empty adapter for `kind` on `clock`.
    pub fn with_clock(kind: TokenKind, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind,
            data: Arc::new(PapayaHashMap::new()),
            clock,
        }
    }

    /// Returns the token kind served by this adapter.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Number of live (unexpired) records.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let guard = self.data.pin();
        guard.iter().filter(|(_, entry)| !entry.is_expired(now)).count()
    }

    /// Returns `true` if no live record is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored record under `id`, expired or not.
    pub fn peek(&self, id: &str) -> Option<StoredRecord> {
        let guard = self.data.pin();
        guard.get(id).map(|entry| entry.record.clone())
    }

    /// Replaces the record under `id` in place, keeping its expiry. Returns
    /// `false` if nothing is stored under `id`.
    ///
    /// Lets tests and tooling simulate a tampered datastore.
    pub fn overwrite(&self, id: &str, record: StoredRecord) -> bool {
        let guard = self.data.pin();
        guard
            .update(id.to_string(), |entry| Entry {
                record: record.clone(),
                expires_at: entry.expires_at,
            })
            .is_some()
    }

    /// Drops every expired entry. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let guard = self.data.pin();

        let mut removed = 0;
        guard.retain(|_, entry| {
            let expired = entry.is_expired(now);
            removed += usize::from(expired);
            !expired
        });
        removed
    }
}

impl std::fmt::Debug for MemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAdapter")
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

#[async_trait]
impl TokenAdapter for MemoryAdapter {
    async fn upsert(&self, id: &str, record: StoredRecord, ttl: Option<u64>) -> TokenResult<()> {
        let expires_at = ttl.map(|ttl| {
            self.clock
                .now()
                .saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX))
        });

        let purged = self.purge_expired();
        if purged > 0 {
            tracing::trace!(kind = %self.kind, purged, "expired records swept");
        }

        let guard = self.data.pin();
        guard.insert(id.to_string(), Entry { record, expires_at });
        tracing::trace!(kind = %self.kind, jti = id, ?expires_at, "record stored");
        Ok(())
    }

    async fn find(&self, id: &str) -> TokenResult<Option<StoredRecord>> {
        let now = self.clock.now();
        let guard = self.data.pin();

        match guard.get(id) {
            Some(entry) if entry.is_expired(now) => {
                guard.remove(id);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.record.clone())),
            None => Ok(None),
        }
    }

    async fn destroy(&self, id: &str) -> TokenResult<()> {
        let guard = self.data.pin();
        guard.remove(id);
        Ok(())
    }

    async fn consume(&self, id: &str) -> TokenResult<()> {
        let now = self.clock.now();
        let guard = self.data.pin();

        // Atomic: a concurrent destroy is never undone.
        guard.update(id.to_string(), |entry| {
            let mut entry = entry.clone();
            entry.record.consumed = Some(ConsumedMarker::At(now));
            entry
        });
        Ok(())
    }

    async fn revoke_by_grant_id(&self, grant_id: &str) -> TokenResult<u64> {
        let guard = self.data.pin();

        let ids: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.record.grant_id.as_deref() == Some(grant_id))
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = 0;
        for id in &ids {
            if guard.remove(id).is_some() {
                removed += 1;
            }
        }

        tracing::debug!(kind = %self.kind, grant_id, removed, "grant records removed");
        Ok(removed)
    }
}
