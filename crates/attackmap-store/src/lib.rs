//! Persistent event cache for the Attack Map dashboard.
//!
//! Every live event is written here so a restarted dashboard can rebuild
//! its charts from the last 24 hours. The cache is bounded in both time
//! and size, and it degrades instead of failing: if the indexed `SQLite`
//! backend cannot be opened, a single JSON document takes its place.
//!
//! # Architecture
//!
//! ```text
//! EventStore::open
//!     |
//!     +-- SQLite ok -------> SqliteDb      (indexed `events` table)
//!     |
//!     +-- any failure -----> DocumentStore (one JSON document on disk)
//! ```
//!
//! # Modules
//!
//! - [`event_store`] -- Backend selection, retention, and the public API
//! - [`sqlite`] -- `SQLite` connection pool and row operations
//! - [`document`] -- JSON document fallback
//! - [`error`] -- Shared error types

pub mod document;
pub mod error;
pub mod event_store;
pub mod sqlite;

pub use document::{DocumentStore, EventDocument};
pub use error::StoreError;
pub use event_store::{
    CleanupReport, DEFAULT_MAX_EVENTS, DEFAULT_RETENTION_WINDOW_MS, EventStore, RetentionPolicy,
    StoreConfig,
};
pub use sqlite::{SqliteConfig, SqliteDb};
