//! Indexed `SQLite` backend.
//!
//! The primary home of the event cache. One `events` table keyed by an
//! auto-increment integer, with secondary indexes on `timestamp`,
//! `source_ip` and `honeypot_id`. The full event is stored as a JSON
//! payload so the row layout never has to track [`Event`] fields.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time
//! checked) so no database is needed at build time. All queries are
//! parameterized.

use std::time::Duration;

use attackmap_types::Event;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::StoreError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `SQLite` connection URL.
    ///
    /// Format: `sqlite://path/to/cache.db` or `sqlite::memory:`
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration from a database URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether the URL names a private in-memory database.
    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Connection pool handle to the `SQLite` cache database.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl core::fmt::Debug for SqliteDb {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SqliteDb")
            .field("size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl SqliteDb {
    /// Open (creating if missing) the database described by `config`.
    ///
    /// An in-memory database lives only as long as its connection, so the
    /// pool is pinned to a single connection that never expires.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL cannot be parsed.
    /// Returns [`StoreError::Sqlite`] if the connection fails.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, StoreError> {
        let connect_options: SqliteConnectOptions = config
            .url
            .parse::<SqliteConnectOptions>()
            .map_err(|e| StoreError::Unavailable(format!("invalid SQLite URL: {e}")))?
            .create_if_missing(true);

        let mut options = SqlitePoolOptions::new().acquire_timeout(config.connect_timeout);
        options = if config.is_in_memory() {
            options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(config.max_connections)
        };

        let pool = options.connect_with(connect_options).await?;

        tracing::info!(
            max_connections = config.max_connections,
            in_memory = config.is_in_memory(),
            "Connected to SQLite"
        );

        Ok(Self { pool })
    }

    /// Run all pending migrations from the `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("SQLite migrations completed");
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }

    // =========================================================================
    // Event rows
    // =========================================================================

    /// Append one event row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if serialization or the insert fails.
    pub async fn insert(&self, event: &Event) -> Result<(), StoreError> {
        let payload = serde_json::to_string(event)?;
        sqlx::query(
            r"INSERT INTO events (event_id, timestamp, source_ip, honeypot_id, cached_at, payload)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(event.id.to_string())
        .bind(event.timestamp)
        .bind(&event.source_ip)
        .bind(&event.honeypot_id)
        .bind(event.cached_at.unwrap_or(event.timestamp))
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Events with `timestamp > cutoff_ms`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn newer_than(&self, cutoff_ms: i64) -> Result<Vec<Event>, StoreError> {
        let payloads =
            sqlx::query_scalar::<_, String>("SELECT payload FROM events WHERE timestamp > ?1")
                .bind(cutoff_ms)
                .fetch_all(&self.pool)
                .await?;
        Ok(decode_payloads(payloads))
    }

    /// Events from one attacker address, using the `source_ip` index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn by_source_ip(&self, ip: &str) -> Result<Vec<Event>, StoreError> {
        let payloads = sqlx::query_scalar::<_, String>(
            "SELECT payload FROM events WHERE source_ip = ?1 ORDER BY key",
        )
        .bind(ip)
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_payloads(payloads))
    }

    /// Events recorded by one honeypot, using the `honeypot_id` index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn by_honeypot(&self, honeypot_id: &str) -> Result<Vec<Event>, StoreError> {
        let payloads = sqlx::query_scalar::<_, String>(
            "SELECT payload FROM events WHERE honeypot_id = ?1 ORDER BY key",
        )
        .bind(honeypot_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_payloads(payloads))
    }

    /// Every stored event, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn all(&self) -> Result<Vec<Event>, StoreError> {
        let payloads = sqlx::query_scalar::<_, String>("SELECT payload FROM events ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_payloads(payloads))
    }

    /// Range delete of every row with `timestamp <= cutoff_ms`.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the delete fails.
    pub async fn delete_through(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE timestamp <= ?1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete the `excess` oldest rows (by timestamp, then insertion order).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the delete fails.
    pub async fn delete_oldest(&self, excess: u64) -> Result<u64, StoreError> {
        if excess == 0 {
            return Ok(0);
        }
        let result = sqlx::query(
            r"DELETE FROM events WHERE key IN (
                  SELECT key FROM events ORDER BY timestamp ASC, key ASC LIMIT ?1
              )",
        )
        .bind(i64::try_from(excess).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM events")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of stored rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Decode JSON payload columns, skipping (and logging) corrupt rows.
fn decode_payloads(payloads: Vec<String>) -> Vec<Event> {
    payloads
        .into_iter()
        .filter_map(|payload| match serde_json::from_str::<Event>(&payload) {
            Ok(event) => match event.validate() {
                Ok(()) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, event_id = %event.id, "Skipping invalid cached event row");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable cached event row");
                None
            }
        })
        .collect()
}
