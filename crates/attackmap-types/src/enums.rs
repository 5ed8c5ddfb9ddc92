//! Enumeration types shared between the core, the store, and the API.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Health of the upstream event feed as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ConnectionState {
    /// A socket is being opened. Initial state.
    Connecting,
    /// Socket open and data arrived within the idle threshold.
    Connected,
    /// Socket open but no fresh data within the idle threshold.
    Idle,
    /// Socket closed, closing, or errored.
    Disconnected,
}

/// Readiness of the underlying socket, mirroring a `WebSocket` ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum SocketReadiness {
    /// Handshake in progress.
    Connecting,
    /// Open and able to receive frames.
    Open,
    /// Close handshake in progress.
    Closing,
    /// Closed or never opened.
    Closed,
}

// ---------------------------------------------------------------------------
// Timeline granularity
// ---------------------------------------------------------------------------

/// Width of one timeline bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Granularity {
    /// One-second buckets, 60 points.
    Second,
    /// One-minute buckets, 60 points.
    #[default]
    Minute,
    /// One-hour buckets, 24 points.
    Hour,
}

impl Granularity {
    /// Bucket width in milliseconds.
    pub const fn step_ms(self) -> i64 {
        match self {
            Self::Second => 1_000,
            Self::Minute => 60_000,
            Self::Hour => 3_600_000,
        }
    }

    /// Fixed number of buckets in the sliding window.
    pub const fn bucket_count(self) -> usize {
        match self {
            Self::Second | Self::Minute => 60,
            Self::Hour => 24,
        }
    }

    /// Total span of the sliding window in milliseconds.
    pub const fn window_ms(self) -> i64 {
        match self {
            Self::Second => 60_000,
            Self::Minute => 3_600_000,
            Self::Hour => 86_400_000,
        }
    }

    /// Round `ts_ms` down to the start of its bucket.
    pub const fn floor(self, ts_ms: i64) -> i64 {
        ts_ms.saturating_sub(ts_ms.rem_euclid(self.step_ms()))
    }

    /// Axis label for a bucket starting at `bucket_start_ms`, in UTC.
    pub fn label(self, bucket_start_ms: i64) -> String {
        let Some(dt) = DateTime::from_timestamp_millis(bucket_start_ms) else {
            return String::new();
        };
        let pattern = match self {
            Self::Second => "%H:%M:%S",
            Self::Minute => "%H:%M",
            Self::Hour => "%H:00",
        };
        dt.format(pattern).to_string()
    }
}

impl core::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" | "s" => Ok(Self::Second),
            "minute" | "minutes" | "m" => Ok(Self::Minute),
            "hour" | "hours" | "h" => Ok(Self::Hour),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Which persistence backend the event cache settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum StorageBackend {
    /// Indexed `SQLite` table.
    Indexed,
    /// Single serialized JSON document.
    Document,
}
