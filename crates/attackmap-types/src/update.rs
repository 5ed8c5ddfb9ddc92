//! Push updates broadcast to presentation-layer subscribers.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ConnectionState;
use crate::event::Event;
use crate::snapshot::ServerStats;

/// A change the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DashboardUpdate {
    /// A live event was ingested.
    Event {
        /// The ingested event.
        event: Event,
        /// Whether the attack table should flash the new row.
        highlight: bool,
        /// Whether a sound cue should play.
        sound: bool,
    },
    /// A cached event selected for map-marker restoration.
    MarkerRestored {
        /// The restored event.
        event: Event,
    },
    /// The connection state changed.
    Connection {
        /// The new state.
        state: ConnectionState,
    },
    /// The upstream server published new totals.
    Stats {
        /// The published totals.
        stats: ServerStats,
    },
    /// Startup replay finished.
    Restored {
        /// Events replayed through aggregation.
        restored: u64,
    },
    /// The local cache was cleared.
    CacheCleared,
}
