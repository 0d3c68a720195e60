//! Tracing bootstrap with a reloadable log level.
//!
//! Library code only emits `tracing` events; embedding binaries call
//! [`init_tracing_from_config`] (or [`init_tracing_with_level`]) once.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Installs the global subscriber at `info`.
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Installs the global subscriber from the logging section.
pub fn init_tracing_from_config(logging: &LoggingConfig) {
    init_tracing_with_level(&logging.level);
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
///
/// A second call is a no-op.
pub fn init_tracing_with_level(level: &str) {
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Applies a new log level at runtime. Returns `false` if tracing was not
/// initialized through this module.
pub fn apply_logging_level(level: &str) -> bool {
    LOG_RELOAD_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|f| *f = EnvFilter::new(level)).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_and_reloadable() {
        init_tracing_with_level("warn");
        init_tracing_with_level("debug");
        assert!(apply_logging_level("trace"));
        tracing::trace!("reloaded");
    }
}
