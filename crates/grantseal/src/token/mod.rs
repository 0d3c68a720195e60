//! Token model and lifecycle.
//!
//! This module provides:
//!
//! - The token model ([`Token`], [`TokenClaims`], [`TokenKind`])
//! - The plain and checksum encoding strategies
//! - The lifecycle service (`save`, `find`, `destroy`, `consume`)

pub mod checksum;
pub mod format;
pub mod kind;
pub mod model;
pub mod plain;
pub mod secret;
pub mod service;

pub use checksum::ChecksumFormat;
pub use format::{Issued, Presented, TokenFormat};
pub use kind::TokenKind;
pub use model::{ConsumedMarker, Token, TokenClaims, TokenPayload};
pub use plain::PlainFormat;
pub use service::{FindOptions, TokenService};
