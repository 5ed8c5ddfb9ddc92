//! Read-only snapshot types served to the presentation layer.
//!
//! These are plain data: the aggregation engine and connection monitor
//! build them on demand and hand out owned copies, so a reader never holds
//! a lock while rendering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ConnectionState, Granularity, SocketReadiness, StorageBackend};

/// One point of the timeline histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimeBucket {
    /// Start of the bucket, Unix epoch milliseconds.
    pub bucket_start: i64,
    /// Axis label (UTC).
    pub label: String,
    /// Events that fell into the bucket.
    pub count: u64,
    /// Width of the bucket.
    pub granularity: Granularity,
}

/// One hour-of-day slot of the attack heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HeatmapCell {
    /// Hour of day, 0-23 (UTC).
    pub hour: u8,
    /// Events observed in this hour slot.
    pub attacks: u64,
    /// `attacks / max(attacks) * 100`.
    pub intensity: f64,
}

/// A ranked attacker address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct IpRanking {
    /// Attacker address.
    pub ip: String,
    /// Total hits.
    pub hits: u64,
    /// Timestamp of the first hit.
    pub first_seen: i64,
    /// Timestamp of the most recent hit.
    pub last_seen: i64,
    /// Protocol of the most recent hit.
    pub last_protocol: String,
    /// Latest known reputation label.
    pub reputation: Option<String>,
    /// Country of the most recent hit.
    pub country: String,
}

/// A ranked attacker country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CountryRanking {
    /// Country name.
    pub country: String,
    /// ISO country code.
    pub country_code: String,
    /// Total hits.
    pub hits: u64,
    /// Timestamp of the first hit.
    pub first_seen: i64,
    /// Timestamp of the most recent hit.
    pub last_seen: i64,
    /// Protocol of the most recent hit.
    pub last_protocol: String,
}

/// Protocol and country counts over the rolling chart window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RollingBreakdown {
    /// Width of the window in milliseconds.
    pub window_ms: i64,
    /// When the breakdown was last recomputed.
    pub computed_at: i64,
    /// Events per protocol inside the window.
    pub protocols: BTreeMap<String, u64>,
    /// Events per country inside the window.
    pub countries: BTreeMap<String, u64>,
    /// Events inside the window.
    pub total: u64,
}

/// Hit totals published by the upstream server in `Stats` messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ServerStats {
    /// Hits in the last minute.
    #[serde(default)]
    pub last_1m: Option<u64>,
    /// Hits in the last hour.
    #[serde(default)]
    pub last_1h: Option<u64>,
    /// Hits in the last 24 hours.
    #[serde(default)]
    pub last_24h: Option<u64>,
}

/// Detailed connectivity status for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConnectionStatus {
    /// Current classified state.
    pub state: ConnectionState,
    /// Current socket readiness.
    pub readiness: SocketReadiness,
    /// When valid data was last received.
    pub last_data_ms: Option<i64>,
    /// Milliseconds since valid data was last received.
    pub data_age_ms: Option<i64>,
    /// Whether a reconnect is scheduled but not yet started.
    pub reconnect_pending: bool,
    /// Reconnect attempts started since launch.
    pub reconnect_attempts: u32,
    /// Close code of the most recent closure.
    pub last_close_code: Option<u16>,
}

/// Top-level dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DashboardSummary {
    /// Events consumed by the aggregation engine since launch.
    pub total_ingested: u64,
    /// Events currently held in the local cache.
    pub cached_events: u64,
    /// Backend the cache is using.
    pub backend: StorageBackend,
    /// Connectivity state.
    pub connection: ConnectionState,
    /// Whether a restore replay is in progress.
    pub restoring: bool,
    /// Active timeline granularity.
    pub granularity: Granularity,
}
