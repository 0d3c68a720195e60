//! # grantseal
//!
//! Token issuance and validation core for OAuth 2.0 / OpenID Connect
//! authorization servers.
//!
//! Tokens are opaque reference values backed by a server-side record. Two
//! encodings are available:
//!
//! - **plain**: an unsigned envelope and a 64 byte random bearer secret
//! - **checksum**: a signed payload plus a checksum-secret that is handed to
//!   the client once and never stored; only its hash is signed into the
//!   payload, so a dump of the datastore cannot be replayed
//!
//! ## Modules
//!
//! - [`token`] - Token model, encodings and the lifecycle service
//! - [`codec`] - Three-part encoding, decoding and verification
//! - [`keystore`] - Integrity signing keys
//! - [`storage`] - Storage adapter contract and per-kind registry
//! - [`events`] - Lifecycle notifications
//! - [`clock`] - Time source
//! - [`config`] - Configuration and loader
//! - [`observability`] - Tracing bootstrap

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod keystore;
pub mod observability;
pub mod storage;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{ClaimSet, CodecError, EncodedParts};
pub use config::{ConfigError, GrantsealConfig, TtlConfig};
pub use error::{ErrorCategory, TokenError};
pub use events::{EventBroadcaster, EventSink, NoopSink, TokenEvent};
pub use keystore::{IntegrityKey, IntegrityKeystore, KeyUse, SigningAlgorithm};
pub use storage::{AdapterFactory, AdapterRegistry, StoredRecord, TokenAdapter};
pub use token::{
    ChecksumFormat, ConsumedMarker, FindOptions, PlainFormat, Token, TokenClaims, TokenFormat,
    TokenKind, TokenService,
};

/// Type alias for token layer results.
pub type TokenResult<T> = Result<T, TokenError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use grantseal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::TokenResult;
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::{GrantsealConfig, TtlConfig};
    pub use crate::error::{ErrorCategory, TokenError};
    pub use crate::events::{EventBroadcaster, EventSink, TokenEvent};
    pub use crate::keystore::{IntegrityKey, IntegrityKeystore, KeyUse, SigningAlgorithm};
    pub use crate::storage::{AdapterFactory, StoredRecord, TokenAdapter};
    pub use crate::token::{
        ConsumedMarker, FindOptions, Token, TokenClaims, TokenKind, TokenService,
    };
}
