//! Token kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// The closed set of token kinds.
///
/// The variant name is both the `kind` claim and the adapter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// OAuth 2.0 access token.
    AccessToken,
    /// Authorization code exchanged at the token endpoint.
    AuthorizationCode,
    /// Refresh token.
    RefreshToken,
    /// Access token issued by the client credentials grant.
    ClientCredentials,
    /// Initial access token for dynamic client registration.
    InitialAccessToken,
    /// Registration access token for client configuration management.
    RegistrationAccessToken,
}

impl TokenKind {
    /// All kinds, in registry slot order.
    pub const ALL: [TokenKind; 6] = [
        Self::AccessToken,
        Self::AuthorizationCode,
        Self::RefreshToken,
        Self::ClientCredentials,
        Self::InitialAccessToken,
        Self::RegistrationAccessToken,
    ];

    /// Returns the kind tag.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AccessToken => "AccessToken",
            Self::AuthorizationCode => "AuthorizationCode",
            Self::RefreshToken => "RefreshToken",
            Self::ClientCredentials => "ClientCredentials",
            Self::InitialAccessToken => "InitialAccessToken",
            Self::RegistrationAccessToken => "RegistrationAccessToken",
        }
    }

    /// Parses a kind tag.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Slot of this kind in [`TokenKind::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| TokenError::kind_mismatch("a known token kind", s))
    }
}
