//! Token layer configuration.
//!
//! Loaded from an optional TOML file overlaid with `GRANTSEAL__SECTION__KEY`
//! environment variables, see [`loader::load_config`].
//!
//! # Example
//!
//! ```toml
//! issuer = "https://op.example.com"
//!
//! [ttl]
//! access_token = "1h"
//! refresh_token = "14d"
//!
//! [features]
//! token_integrity = true
//!
//! [logging]
//! level = "info"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::TokenKind;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantsealConfig {
    /// Issuer written to and expected in the `iss` claim.
    pub issuer: String,

    /// Per-kind token lifetimes.
    pub ttl: TtlConfig,

    /// Feature toggles.
    pub features: FeaturesConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for GrantsealConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:3000".to_string(),
            ttl: TtlConfig::default(),
            features: FeaturesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Token lifetimes per kind. A missing lifetime means the kind never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token: Option<Duration>,

    /// Authorization code lifetime. Codes should be short-lived.
    #[serde(with = "humantime_serde")]
    pub authorization_code: Option<Duration>,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token: Option<Duration>,

    /// Client credentials access token lifetime.
    #[serde(with = "humantime_serde")]
    pub client_credentials: Option<Duration>,

    /// Initial access token lifetime.
    #[serde(with = "humantime_serde")]
    pub initial_access_token: Option<Duration>,

    /// Registration access token lifetime.
    #[serde(with = "humantime_serde")]
    pub registration_access_token: Option<Duration>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            access_token: Some(Duration::from_secs(3600)),             // 1 hour
            authorization_code: Some(Duration::from_secs(600)),        // 10 minutes
            refresh_token: Some(Duration::from_secs(14 * 24 * 3600)),  // 14 days
            client_credentials: Some(Duration::from_secs(600)),        // 10 minutes
            initial_access_token: None,
            registration_access_token: None,
        }
    }
}

impl TtlConfig {
    /// A configuration in which no kind expires.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            access_token: None,
            authorization_code: None,
            refresh_token: None,
            client_credentials: None,
            initial_access_token: None,
            registration_access_token: None,
        }
    }

    /// Returns the configured lifetime of `kind`.
    #[must_use]
    pub fn ttl_for(&self, kind: TokenKind) -> Option<Duration> {
        match kind {
            TokenKind::AccessToken => self.access_token,
            TokenKind::AuthorizationCode => self.authorization_code,
            TokenKind::RefreshToken => self.refresh_token,
            TokenKind::ClientCredentials => self.client_credentials,
            TokenKind::InitialAccessToken => self.initial_access_token,
            TokenKind::RegistrationAccessToken => self.registration_access_token,
        }
    }

    /// Sets the lifetime of `kind`.
    #[must_use]
    pub fn with_ttl(mut self, kind: TokenKind, ttl: Option<Duration>) -> Self {
        let slot = match kind {
            TokenKind::AccessToken => &mut self.access_token,
            TokenKind::AuthorizationCode => &mut self.authorization_code,
            TokenKind::RefreshToken => &mut self.refresh_token,
            TokenKind::ClientCredentials => &mut self.client_credentials,
            TokenKind::InitialAccessToken => &mut self.initial_access_token,
            TokenKind::RegistrationAccessToken => &mut self.registration_access_token,
        };
        *slot = ttl;
        self
    }
}

/// Feature toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Use the checksum (signed) encoding for every kind.
    /// Requires an integrity keystore at startup.
    pub token_integrity: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error or off.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl GrantsealConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - A configured lifetime is zero
    /// - The log level is unknown
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        for kind in TokenKind::ALL {
            if self.ttl.ttl_for(kind).is_some_and(|ttl| ttl.is_zero()) {
                return Err(ConfigError::InvalidValue(format!(
                    "ttl for {kind} must be > 0"
                )));
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }

        Ok(())
    }
}

pub mod loader {
    use std::path::PathBuf;

    use config::{Config, Environment, File, Map};

    use super::{ConfigError, GrantsealConfig};

    /// File read when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "grantseal.toml";

    /// Loads and validates the configuration.
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_config(path: Option<&str>) -> Result<GrantsealConfig, ConfigError> {
        build(path, None)
    }

    /// Same as [`load_config`], with environment variables taken from `vars`
    /// instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_config_with_env(
        path: Option<&str>,
        vars: Map<String, String>,
    ) -> Result<GrantsealConfig, ConfigError> {
        build(path, Some(vars))
    }

    fn build(
        path: Option<&str>,
        vars: Option<Map<String, String>>,
    ) -> Result<GrantsealConfig, ConfigError> {
        let mut builder = Config::builder();

        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }

        // Environment variable overrides, e.g., GRANTSEAL__FEATURES__TOKEN_INTEGRITY=true
        builder = builder.add_source(
            Environment::with_prefix("GRANTSEAL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(vars),
        );

        let merged: GrantsealConfig = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;

        merged.validate()?;
        Ok(merged)
    }
}
