//! The retention-bounded event cache.
//!
//! [`EventStore`] picks its backend once, in [`EventStore::open`]: the
//! indexed `SQLite` table when it initialises cleanly, otherwise the JSON
//! document. Callers never see which one they got except through
//! [`EventStore::backend_kind`].

use std::path::PathBuf;
use std::sync::Arc;

use attackmap_types::{Clock, Event, StorageBackend};

use crate::document::DocumentStore;
use crate::error::StoreError;
use crate::sqlite::{SqliteConfig, SqliteDb};

/// Default retention window: 24 hours.
pub const DEFAULT_RETENTION_WINDOW_MS: i64 = 86_400_000;

/// Default maximum number of cached events.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// How long and how many events the cache keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Events at or older than `now - window_ms` are purged.
    pub window_ms: i64,
    /// Hard cap on cached events, enforced oldest-first.
    pub max_count: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_RETENTION_WINDOW_MS,
            max_count: DEFAULT_MAX_EVENTS,
        }
    }
}

impl RetentionPolicy {
    /// Oldest timestamp that is already expired at `now_ms`.
    pub const fn cutoff(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.window_ms)
    }
}

/// Where the cache lives.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `SQLite` URL for the indexed backend. `None` forces the fallback.
    pub sqlite_url: Option<String>,
    /// Path of the fallback JSON document.
    pub document_path: PathBuf,
    /// Retention limits.
    pub retention: RetentionPolicy,
}

impl StoreConfig {
    /// Configuration for the given `SQLite` URL and document path.
    pub fn new(sqlite_url: Option<&str>, document_path: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_url: sqlite_url.map(str::to_owned),
            document_path: document_path.into(),
            retention: RetentionPolicy::default(),
        }
    }

    /// Override the retention limits.
    #[must_use]
    pub const fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }
}

/// Result of one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Events removed for falling outside the retention window.
    pub expired: u64,
    /// Events removed to get back under the count cap.
    pub evicted: u64,
    /// Events left in the cache.
    pub remaining: u64,
}

#[derive(Debug)]
enum Backend {
    Indexed(SqliteDb),
    Document(DocumentStore),
}

/// Persistent, retention-bounded log of ingested events.
#[derive(Debug)]
pub struct EventStore {
    backend: Backend,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    /// Open the cache, preferring the indexed backend.
    ///
    /// Any failure to initialise `SQLite` (no URL, bad URL, open or
    /// migration failure) is logged and the document backend is used for
    /// the lifetime of the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] only if the fallback document cannot be
    /// opened either.
    pub async fn open(config: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let backend = match open_indexed(config).await {
            Ok(db) => Backend::Indexed(db),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %config.document_path.display(),
                    "Indexed event store unavailable, falling back to JSON document"
                );
                Backend::Document(DocumentStore::open(&config.document_path).await?)
            }
        };

        let store = Self {
            backend,
            retention: config.retention,
            clock,
        };
        tracing::info!(
            backend = ?store.backend_kind(),
            window_ms = store.retention.window_ms,
            max_count = store.retention.max_count,
            "Event store ready"
        );
        Ok(store)
    }

    /// Which backend was selected.
    pub const fn backend_kind(&self) -> StorageBackend {
        match self.backend {
            Backend::Indexed(_) => StorageBackend::Indexed,
            Backend::Document(_) => StorageBackend::Document,
        }
    }

    /// The active retention limits.
    pub const fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Persist an event, logging and dropping any failure.
    pub async fn store(&self, event: &Event) {
        if let Err(e) = self.try_store(event).await {
            tracing::warn!(
                error = %e,
                event_id = %event.id,
                source_ip = %event.source_ip,
                "Failed to cache event"
            );
        }
    }

    /// Persist an event, stamping `cached_at` if it has none.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`StoreError`].
    pub async fn try_store(&self, event: &Event) -> Result<(), StoreError> {
        let stamped = event.clone().with_cached_at(self.clock.now_ms());
        match &self.backend {
            Backend::Indexed(db) => db.insert(&stamped).await,
            Backend::Document(doc) => doc.insert(&stamped).await,
        }
    }

    /// Events with `timestamp > now - window_ms`, unordered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the indexed query fails.
    pub async fn query_recent(&self, window_ms: i64) -> Result<Vec<Event>, StoreError> {
        let cutoff = self.clock.now_ms().saturating_sub(window_ms);
        match &self.backend {
            Backend::Indexed(db) => db.newer_than(cutoff).await,
            Backend::Document(doc) => Ok(doc.filter(|e| e.timestamp > cutoff).await),
        }
    }

    /// Every cached event from one attacker address.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the indexed query fails.
    pub async fn query_by_source_ip(&self, ip: &str) -> Result<Vec<Event>, StoreError> {
        match &self.backend {
            Backend::Indexed(db) => db.by_source_ip(ip).await,
            Backend::Document(doc) => Ok(doc.filter(|e| e.source_ip == ip).await),
        }
    }

    /// Every cached event recorded by one honeypot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the indexed query fails.
    pub async fn query_by_honeypot(&self, honeypot_id: &str) -> Result<Vec<Event>, StoreError> {
        match &self.backend {
            Backend::Indexed(db) => db.by_honeypot(honeypot_id).await,
            Backend::Document(doc) => Ok(doc.filter(|e| e.honeypot_id == honeypot_id).await),
        }
    }

    /// Every retained event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the indexed query fails.
    pub async fn load_all(&self) -> Result<Vec<Event>, StoreError> {
        match &self.backend {
            Backend::Indexed(db) => db.all().await,
            Backend::Document(doc) => Ok(doc.filter(|_| true).await),
        }
    }

    /// Apply the retention policy.
    ///
    /// Deletes everything at or before `now - window_ms`, then trims the
    /// oldest events until at most `max_count` remain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a backend operation fails.
    pub async fn cleanup(&self) -> Result<CleanupReport, StoreError> {
        let now = self.clock.now_ms();
        let cutoff = self.retention.cutoff(now);
        let max = u64::try_from(self.retention.max_count).unwrap_or(u64::MAX);

        let report = match &self.backend {
            Backend::Indexed(db) => {
                let expired = db.delete_through(cutoff).await?;
                let excess = db.count().await?.saturating_sub(max);
                let evicted = db.delete_oldest(excess).await?;
                CleanupReport {
                    expired,
                    evicted,
                    remaining: db.count().await?,
                }
            }
            Backend::Document(doc) => {
                let (expired, evicted, remaining) =
                    doc.retain(cutoff, self.retention.max_count, now).await?;
                CleanupReport {
                    expired,
                    evicted,
                    remaining,
                }
            }
        };

        tracing::debug!(
            expired = report.expired,
            evicted = report.evicted,
            remaining = report.remaining,
            "Event cache cleanup"
        );
        Ok(report)
    }

    /// Drop every cached event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend refuses; the caller is
    /// expected to surface this to the user.
    pub async fn clear(&self) -> Result<u64, StoreError> {
        let removed = match &self.backend {
            Backend::Indexed(db) => db.delete_all().await?,
            Backend::Document(doc) => doc.clear().await?,
        };
        tracing::info!(removed, "Event cache cleared");
        Ok(removed)
    }

    /// Number of cached events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the indexed count fails.
    pub async fn len(&self) -> Result<u64, StoreError> {
        match &self.backend {
            Backend::Indexed(db) => db.count().await,
            Backend::Document(doc) => Ok(doc.count().await),
        }
    }

    /// Whether the cache is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the indexed count fails.
    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Release backend resources.
    pub async fn close(&self) {
        if let Backend::Indexed(db) = &self.backend {
            db.close().await;
        }
    }
}

async fn open_indexed(config: &StoreConfig) -> Result<SqliteDb, StoreError> {
    let url = config
        .sqlite_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| StoreError::Unavailable("no SQLite URL configured".to_owned()))?;
    let db = SqliteDb::connect(&SqliteConfig::new(url)).await?;
    db.run_migrations().await?;
    Ok(db)
}
