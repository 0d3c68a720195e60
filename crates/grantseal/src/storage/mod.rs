//! Storage adapter contract.
//!
//! One adapter instance serves one token kind. Adapters persist a
//! [`StoredRecord`] per `jti` and own durability, expiry and retry policy;
//! the token layer never retries.
//!
//! # Implementations
//!
//! Implementations are provided in separate crates:
//! - `grantseal-memory` - in-process backend

mod registry;

pub use registry::{AdapterFactory, AdapterRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TokenResult;
use crate::codec::EncodedParts;
use crate::token::ConsumedMarker;

/// What an adapter persists for one token.
///
/// The three encoded parts are kept apart; the opaque value handed to the
/// client is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// Base64url JSON header.
    pub header: String,

    /// Base64url JSON payload.
    pub payload: String,

    /// Signature, or bearer secret for the plain encoding.
    pub signature: String,

    /// Owning grant, duplicated out of the payload for cascade lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,

    /// Set by [`TokenAdapter::consume`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed: Option<ConsumedMarker>,
}

impl StoredRecord {
    /// Builds a fresh record from encoded parts.
    #[must_use]
    pub fn new(parts: EncodedParts, grant_id: Option<String>) -> Self {
        Self {
            header: parts.header,
            payload: parts.payload,
            signature: parts.signature,
            grant_id,
            consumed: None,
        }
    }

    /// Returns the encoded parts.
    #[must_use]
    pub fn parts(&self) -> EncodedParts {
        EncodedParts {
            header: self.header.clone(),
            payload: self.payload.clone(),
            signature: self.signature.clone(),
        }
    }
}

/// Storage trait for token records of a single kind.
#[async_trait]
pub trait TokenAdapter: Send + Sync {
    /// Inserts or replaces the record stored under `id`.
    ///
    /// # Arguments
    ///
    /// * `id` - The token `jti`
    /// * `record` - The record to persist
    /// * `ttl` - Seconds until the record may be dropped; `None` keeps it
    ///   until destroyed
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, id: &str, record: StoredRecord, ttl: Option<u64>) -> TokenResult<()>;

    /// Finds the record stored under `id`.
    ///
    /// # Returns
    ///
    /// Returns `Some(record)` if found, `None` if absent or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, id: &str) -> TokenResult<Option<StoredRecord>>;

    /// Deletes the record stored under `id`. Deleting an absent record is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn destroy(&self, id: &str) -> TokenResult<()>;

    /// Marks the record stored under `id` as consumed without deleting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, id: &str) -> TokenResult<()>;

    /// Deletes every record owned by `grant_id`.
    ///
    /// Backends without a grant index keep the default, which deletes
    /// nothing.
    ///
    /// # Returns
    ///
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_by_grant_id(&self, _grant_id: &str) -> TokenResult<u64> {
        Ok(0)
    }
}
