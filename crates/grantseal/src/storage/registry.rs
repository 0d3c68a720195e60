//! Per-kind adapter cache.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::storage::TokenAdapter;
use crate::token::TokenKind;

/// Creates the adapter for a token kind.
pub trait AdapterFactory: Send + Sync {
    /// Builds a new adapter for `kind`. Called at most once per kind and
    /// registry.
    fn create(&self, kind: TokenKind) -> Arc<dyn TokenAdapter>;
}

/// Lazily creates and caches one adapter per token kind.
///
/// Concurrent first use of a kind runs the factory once; later reads are
/// lock-free. A binding is never replaced.
pub struct AdapterRegistry {
    factory: Arc<dyn AdapterFactory>,
    slots: [OnceLock<Arc<dyn TokenAdapter>>; TokenKind::ALL.len()],
}

impl AdapterRegistry {
    /// Creates an empty registry backed by `factory`.
    pub fn new(factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            factory,
            slots: Default::default(),
        }
    }

    /// Returns the adapter for `kind`, creating it on first use.
    pub fn adapter(&self, kind: TokenKind) -> &Arc<dyn TokenAdapter> {
        self.slots[kind.index()].get_or_init(|| {
            tracing::debug!(kind = %kind, "creating storage adapter");
            self.factory.create(kind)
        })
    }

    /// Returns the adapter for `kind` if it has been created.
    pub fn get(&self, kind: TokenKind) -> Option<&Arc<dyn TokenAdapter>> {
        self.slots[kind.index()].get()
    }

    /// Kinds whose adapter exists.
    pub fn initialized(&self) -> impl Iterator<Item = TokenKind> + '_ {
        TokenKind::ALL
            .into_iter()
            .filter(|kind| self.slots[kind.index()].get().is_some())
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("initialized", &self.initialized().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
