//! Structured logging setup for the `dircache` CLI.

#![deny(unsafe_code)]

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Errors initializing the global logging subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed (only the CLI's `main`
    /// should call [`init_logging`], and only once).
    #[error("a global tracing subscriber is already set")]
    AlreadyInitialized,
}

/// Install a plain-text, human-readable logging subscriber filtered by
/// `RUST_LOG` (default `info`).
///
/// Unlike a long-running service, `dircache`'s output is read by a person
/// at a terminal right after the command exits rather than shipped to a
/// log aggregator — so this intentionally renders compact text, not JSON.
pub fn init_logging() -> Result<(), TelemetryError> {
    let fmt_layer = fmt::layer().with_target(false).with_level(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(|_| TelemetryError::AlreadyInitialized)
}
