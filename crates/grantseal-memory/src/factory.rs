use std::sync::Arc;

use grantseal::{AdapterFactory, Clock, SystemClock, TokenAdapter, TokenKind};
use papaya::HashMap as PapayaHashMap;

use crate::storage::MemoryAdapter;

/// Creates one [`MemoryAdapter`] per token kind, all sharing a clock.
///
/// Created adapters stay reachable through [`MemoryAdapterFactory::adapter`]
/// for inspection.
pub struct MemoryAdapterFactory {
    clock: Arc<dyn Clock>,
    created: PapayaHashMap<TokenKind, Arc<MemoryAdapter>>,
}

impl MemoryAdapterFactory {
    /// Creates a factory on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a factory whose adapters expire records against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            created: PapayaHashMap::new(),
        }
    }

    /// Returns the adapter created for `kind`, if any.
    pub fn adapter(&self, kind: TokenKind) -> Option<Arc<MemoryAdapter>> {
        self.created.pin().get(&kind).cloned()
    }
}

impl Default for MemoryAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterFactory for MemoryAdapterFactory {
    fn create(&self, kind: TokenKind) -> Arc<dyn TokenAdapter> {
        let adapter = Arc::new(MemoryAdapter::with_clock(kind, Arc::clone(&self.clock)));
        self.created.pin().insert(kind, Arc::clone(&adapter));
        adapter
    }
}

impl std::fmt::Debug for MemoryAdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAdapterFactory")
            .field("created", &self.created.len())
            .finish_non_exhaustive()
    }
}
