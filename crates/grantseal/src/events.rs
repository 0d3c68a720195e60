//! Token lifecycle notifications.
//!
//! Emission is fire-and-forget: the lifecycle never waits for listeners.
//! [`EventBroadcaster`] fans events out over a tokio broadcast channel;
//! slow receivers lose the oldest events once the buffer is full.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::token::TokenKind;

/// Default buffer size for the broadcast channel.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// A lifecycle notification about a token or a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TokenEvent {
    /// A token was persisted and its opaque value handed out.
    Issued {
        /// Kind of the token.
        kind: TokenKind,
        /// Token identifier.
        jti: String,
        /// Owning grant, if any.
        grant_id: Option<String>,
    },
    /// A token was destroyed.
    Revoked {
        /// Kind of the token.
        kind: TokenKind,
        /// Token identifier.
        jti: String,
        /// Owning grant, if any.
        grant_id: Option<String>,
    },
    /// A token was marked as used.
    Consumed {
        /// Kind of the token.
        kind: TokenKind,
        /// Token identifier.
        jti: String,
        /// Owning grant, if any.
        grant_id: Option<String>,
    },
    /// A grant was revoked; every token issued under it should die.
    GrantRevoked {
        /// The revoked grant.
        grant_id: String,
    },
}

impl TokenEvent {
    /// Returns the dotted event name (`token.issued`, `grant.revoked`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Issued { .. } => "token.issued",
            Self::Revoked { .. } => "token.revoked",
            Self::Consumed { .. } => "token.consumed",
            Self::GrantRevoked { .. } => "grant.revoked",
        }
    }

    /// Returns the token identifier, if the event concerns a single token.
    #[must_use]
    pub fn jti(&self) -> Option<&str> {
        match self {
            Self::Issued { jti, .. } | Self::Revoked { jti, .. } | Self::Consumed { jti, .. } => {
                Some(jti)
            }
            Self::GrantRevoked { .. } => None,
        }
    }
}

/// Outbound notification port.
pub trait EventSink: Send + Sync {
    /// Publishes an event. Must not block on listeners.
    fn emit(&self, event: TokenEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: TokenEvent) {}
}

/// Broadcaster for token events.
///
/// Cheap to clone; every clone publishes on the same channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<TokenEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new broadcaster with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new broadcaster wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBroadcaster {
    fn emit(&self, event: TokenEvent) {
        tracing::trace!(event = event.name(), jti = ?event.jti(), "emitting token event");
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
