//! Configuration loading and typed config structures for the dashboard.
//!
//! The configuration lives in `attackmap.yaml`. Every field has a default,
//! so a missing file or a partial one yields a runnable configuration.
//! A handful of deployment-specific values can be overridden from the
//! environment without touching the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use attackmap_store::{RetentionPolicy, StoreConfig};
use attackmap_types::Granularity;
use serde::Deserialize;

use crate::aggregate::EngineConfig;
use crate::connection::MonitorConfig;
use crate::restore::RestoreConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level dashboard configuration, mirroring `attackmap.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardConfig {
    /// Upstream feed and connection supervision.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Event cache location and retention.
    #[serde(default)]
    pub store: CacheConfig,

    /// Aggregation, restore, and refresh settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Snapshot API listener.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DashboardConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// A missing file is not an error: defaults are used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse configuration from a YAML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override deployment values from a key lookup.
    ///
    /// Recognised keys:
    /// - `ATTACKMAP_WS_URL` overrides `upstream.ws_url`
    /// - `ATTACKMAP_SQLITE_URL` overrides `store.sqlite_url` (empty disables it)
    /// - `ATTACKMAP_DOCUMENT_PATH` overrides `store.document_path`
    /// - `ATTACKMAP_OBSERVER_PORT` overrides `observer.port`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ATTACKMAP_WS_URL") {
            self.upstream.ws_url = val;
        }
        if let Some(val) = lookup("ATTACKMAP_SQLITE_URL") {
            self.store.sqlite_url = Some(val).filter(|v| !v.trim().is_empty());
        }
        if let Some(val) = lookup("ATTACKMAP_DOCUMENT_PATH") {
            self.store.document_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("ATTACKMAP_OBSERVER_PORT") {
            match val.trim().parse() {
                Ok(port) => self.observer.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "Ignoring invalid observer port"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Upstream feed and connection supervision settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpstreamConfig {
    /// `WebSocket` URL of the attack-map server.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Delay before a reconnect after an abnormal closure.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Data older than this marks an open socket as idle.
    #[serde(default = "default_idle_threshold_ms")]
    pub idle_threshold_ms: u64,

    /// How often connection state is re-evaluated.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the heartbeat checks for staleness.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Data older than this is logged by the heartbeat.
    #[serde(default = "default_stale_log_threshold_ms")]
    pub stale_log_threshold_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            idle_threshold_ms: default_idle_threshold_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            stale_log_threshold_ms: default_stale_log_threshold_ms(),
        }
    }
}

impl UpstreamConfig {
    /// Thresholds for the connection monitor.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            idle_threshold_ms: to_i64(self.idle_threshold_ms),
            stale_log_threshold_ms: to_i64(self.stale_log_threshold_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }

    /// Interval of the connection poll task.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Interval of the heartbeat task.
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Event cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// `SQLite` URL of the indexed backend. Absent selects the fallback.
    #[serde(default = "default_sqlite_url")]
    pub sqlite_url: Option<String>,

    /// Path of the fallback JSON document.
    #[serde(default = "default_document_path")]
    pub document_path: PathBuf,

    /// Events older than this are purged.
    #[serde(default = "default_retention_window_ms")]
    pub retention_window_ms: u64,

    /// Hard cap on cached events.
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// How often retention cleanup runs.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sqlite_url: default_sqlite_url(),
            document_path: default_document_path(),
            retention_window_ms: default_retention_window_ms(),
            max_events: default_max_events(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

impl CacheConfig {
    /// Retention limits for the store.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            window_ms: to_i64(self.retention_window_ms),
            max_count: self.max_events,
        }
    }

    /// Store configuration for [`attackmap_store::EventStore::open`].
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.sqlite_url.as_deref(), self.document_path.clone())
            .with_retention(self.retention())
    }

    /// Interval of the cleanup task.
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregation, restore, and refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AggregationConfig {
    /// Initial timeline granularity.
    #[serde(default)]
    pub granularity: Granularity,

    /// How often the timeline advances and the rolling breakdown is rescanned.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Width of the rolling protocol/country breakdown.
    #[serde(default = "default_rolling_window_ms")]
    pub rolling_window_ms: u64,

    /// Maximum rows returned by a top-K read.
    #[serde(default = "default_top_k_cap")]
    pub top_k_cap: usize,

    /// Events replayed per chunk during restore.
    #[serde(default = "default_restore_chunk_size")]
    pub restore_chunk_size: usize,

    /// Distinct marker locations restored onto the map.
    #[serde(default = "default_marker_cap")]
    pub marker_cap: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            refresh_interval_ms: default_refresh_interval_ms(),
            rolling_window_ms: default_rolling_window_ms(),
            top_k_cap: default_top_k_cap(),
            restore_chunk_size: default_restore_chunk_size(),
            marker_cap: default_marker_cap(),
        }
    }
}

impl AggregationConfig {
    /// Engine settings. History retention follows the cache's policy.
    pub fn engine_config(&self, retention: RetentionPolicy) -> EngineConfig {
        EngineConfig {
            granularity: self.granularity,
            rolling_window_ms: to_i64(self.rolling_window_ms),
            top_k_cap: self.top_k_cap,
            retention,
        }
    }

    /// Restore replay settings.
    pub const fn restore_config(&self) -> RestoreConfig {
        RestoreConfig {
            chunk_size: self.restore_chunk_size,
            marker_cap: self.marker_cap,
        }
    }

    /// Interval of the refresh task.
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// Observer and logging
// ---------------------------------------------------------------------------

/// Snapshot API listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_ws_url() -> String {
    "ws://127.0.0.1:5000/websocket".to_owned()
}

const fn default_reconnect_delay_ms() -> u64 {
    60_000
}

const fn default_idle_threshold_ms() -> u64 {
    30_000
}

const fn default_poll_interval_ms() -> u64 {
    2_000
}

const fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

const fn default_stale_log_threshold_ms() -> u64 {
    60_000
}

#[allow(clippy::unnecessary_wraps)]
fn default_sqlite_url() -> Option<String> {
    Some("sqlite://attackmap-cache.db".to_owned())
}

fn default_document_path() -> PathBuf {
    PathBuf::from("attackmap-cache.json")
}

const fn default_retention_window_ms() -> u64 {
    86_400_000
}

const fn default_max_events() -> usize {
    10_000
}

const fn default_cleanup_interval_ms() -> u64 {
    300_000
}

const fn default_refresh_interval_ms() -> u64 {
    5_000
}

const fn default_rolling_window_ms() -> u64 {
    900_000
}

const fn default_top_k_cap() -> usize {
    100
}

const fn default_restore_chunk_size() -> usize {
    500
}

const fn default_marker_cap() -> usize {
    200
}

fn default_observer_host() -> String {
    "127.0.0.1".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = DashboardConfig::default();
        assert_eq!(config.upstream.reconnect_delay_ms, 60_000);
        assert_eq!(config.upstream.idle_threshold_ms, 30_000);
        assert_eq!(config.upstream.poll_interval_ms, 2_000);
        assert_eq!(config.store.max_events, 10_000);
        assert_eq!(config.store.cleanup_interval_ms, 300_000);
        assert_eq!(config.aggregation.rolling_window_ms, 900_000);
        assert_eq!(config.aggregation.restore_chunk_size, 500);
        assert_eq!(config.aggregation.marker_cap, 200);
        assert_eq!(config.aggregation.top_k_cap, 100);
        assert_eq!(config.aggregation.granularity, Granularity::Minute);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
upstream:
  ws_url: "ws://map.example:5000/websocket"
store:
  sqlite_url: null
  max_events: 500
aggregation:
  granularity: hour
logging:
  json: true
"#;
        let config = DashboardConfig::parse(yaml).unwrap();
        assert_eq!(config.upstream.ws_url, "ws://map.example:5000/websocket");
        assert_eq!(config.upstream.reconnect_delay_ms, 60_000);
        assert_eq!(config.store.sqlite_url, None);
        assert_eq!(config.store.retention().max_count, 500);
        assert_eq!(config.aggregation.granularity, Granularity::Hour);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let result = DashboardConfig::parse("upstream: [unclosed");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig::from_file(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.observer.port, 8080);
    }

    #[test]
    fn overrides_replace_deployment_values() {
        let mut config = DashboardConfig::default();
        config.apply_overrides(|key| match key {
            "ATTACKMAP_WS_URL" => Some("ws://other:1/websocket".to_owned()),
            "ATTACKMAP_SQLITE_URL" => Some(String::new()),
            "ATTACKMAP_DOCUMENT_PATH" => Some("/tmp/doc.json".to_owned()),
            "ATTACKMAP_OBSERVER_PORT" => Some("9091".to_owned()),
            _ => None,
        });
        assert_eq!(config.upstream.ws_url, "ws://other:1/websocket");
        assert_eq!(config.store.sqlite_url, None);
        assert_eq!(config.store.document_path, PathBuf::from("/tmp/doc.json"));
        assert_eq!(config.observer.port, 9091);
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let mut config = DashboardConfig::default();
        config.apply_overrides(|key| (key == "ATTACKMAP_OBSERVER_PORT").then(|| "nope".to_owned()));
        assert_eq!(config.observer.port, 8080);
    }
}
