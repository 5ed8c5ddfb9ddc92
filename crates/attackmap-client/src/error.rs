//! Error types for the client binary.
//!
//! Everything that can stop the process at startup funnels into
//! [`ClientError`]. Transport failures never do: they become reconnects.

use attackmap_core::ConfigError;
use attackmap_observer::StartupError;
use attackmap_store::StoreError;

/// Errors that end the client process.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Neither cache backend could be opened.
    #[error("event cache error: {0}")]
    Store(#[from] StoreError),

    /// The snapshot API could not start.
    #[error("snapshot API error: {0}")]
    Startup(#[from] StartupError),

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {0}")]
    Signal(#[from] std::io::Error),
}
