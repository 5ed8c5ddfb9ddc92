//! Error types for the event cache.
//!
//! Store operations never abort the dashboard: callers on the live path
//! log a [`StoreError`] and drop the effect. Only `clear()` surfaces it.

/// Errors that can occur in the event cache.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The indexed backend could not be used at all.
    #[error("indexed store unavailable: {0}")]
    Unavailable(String),

    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A `SQLite` migration failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Reading or writing the document file failed.
    #[error("document I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event or the document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
