//! Token layer error types.
//!
//! Lookup failures are split into three families so callers can tell an
//! attack attempt from a simple miss:
//!
//! - malformed input (the opaque value does not have the expected shape)
//! - invalid token (found, but fails an integrity or claim check)
//! - not found, which is not an error at all and surfaces as `Ok(None)`
//!
//! Externally every lookup failure maps to the `invalid_token` OAuth error
//! code; the finer distinction is kept for audit logging.

use std::fmt;

use crate::codec::CodecError;

/// Errors that can occur while issuing, finding or terminating tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The opaque token value does not match the expected segment layout.
    #[error("Malformed token value")]
    Malformed,

    /// The token was found but failed an integrity or claim check.
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// Which check rejected the token.
        reason: String,
    },

    /// A token was constructed with a `kind` tag that does not belong to
    /// the kind it is being built as.
    #[error("Kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        /// The kind the token is being constructed as.
        expected: String,
        /// The kind tag carried by the claims.
        found: String,
    },

    /// The token layer is misconfigured (missing signing key, bad TTL).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The storage adapter failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// Encoding or signing a token failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An unexpected internal error occurred (entropy source failure).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl TokenError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    /// Creates a new `KindMismatch` error.
    #[must_use]
    pub fn kind_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::KindMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the presented value was rejected (malformed or invalid).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Malformed | Self::InvalidToken { .. })
    }

    /// Returns `true` if this is a programming or deployment error.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::KindMismatch { .. } | Self::Configuration { .. })
    }

    /// Returns the error category for audit logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Malformed => ErrorCategory::Input,
            Self::InvalidToken { .. } => ErrorCategory::Integrity,
            Self::KindMismatch { .. } => ErrorCategory::Defect,
            Self::Configuration { .. } => ErrorCategory::Defect,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Codec(_) => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the OAuth 2.0 error code shown to the external caller.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::Malformed | Self::InvalidToken { .. } => "invalid_token",
            Self::KindMismatch { .. }
            | Self::Configuration { .. }
            | Self::Storage { .. }
            | Self::Codec(_)
            | Self::Internal { .. } => "server_error",
        }
    }
}

/// Categories of token errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The presented value is structurally wrong.
    Input,
    /// The presented value failed an integrity check (possible tampering).
    Integrity,
    /// Programming or deployment error.
    Defect,
    /// Storage, entropy or signing infrastructure failure.
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Integrity => write!(f, "integrity"),
            Self::Defect => write!(f, "defect"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TokenError::Malformed.to_string(), "Malformed token value");

        let err = TokenError::invalid_token("checksum mismatch");
        assert_eq!(err.to_string(), "Invalid token: checksum mismatch");

        let err = TokenError::kind_mismatch("AccessToken", "RefreshToken");
        assert_eq!(
            err.to_string(),
            "Kind mismatch: expected AccessToken, found RefreshToken"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(TokenError::Malformed.is_rejection());
        assert!(TokenError::invalid_token("x").is_rejection());
        assert!(!TokenError::storage("down").is_rejection());

        assert!(TokenError::configuration("no key").is_defect());
        assert!(TokenError::kind_mismatch("a", "b").is_defect());
        assert!(!TokenError::Malformed.is_defect());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(TokenError::Malformed.category(), ErrorCategory::Input);
        assert_eq!(
            TokenError::invalid_token("x").category(),
            ErrorCategory::Integrity
        );
        assert_eq!(
            TokenError::storage("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            TokenError::configuration("x").category(),
            ErrorCategory::Defect
        );
    }

    #[test]
    fn test_lookup_failures_share_oauth_code() {
        assert_eq!(TokenError::Malformed.oauth_error_code(), "invalid_token");
        assert_eq!(
            TokenError::invalid_token("bad signature").oauth_error_code(),
            "invalid_token"
        );
        assert_eq!(
            TokenError::storage("down").oauth_error_code(),
            "server_error"
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Input.to_string(), "input");
        assert_eq!(ErrorCategory::Integrity.to_string(), "integrity");
        assert_eq!(ErrorCategory::Defect.to_string(), "defect");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
