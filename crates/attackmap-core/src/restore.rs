//! Startup replay of cached events.
//!
//! Replay never holds the engine lock across a yield: each chunk takes the
//! write lock, folds its events in, releases it, and yields to the runtime
//! so scheduled tasks and live ingestion keep running during a long restore.

use std::collections::HashSet;

use attackmap_types::{Clock, Event};
use tokio::sync::RwLock;

use crate::aggregate::AggregationEngine;

/// Default events replayed per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default distinct marker locations restored onto the map.
pub const DEFAULT_MARKER_CAP: usize = 200;

/// Restore replay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreConfig {
    /// Events replayed per chunk.
    pub chunk_size: usize,
    /// Distinct marker locations kept.
    pub marker_cap: usize,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            marker_cap: DEFAULT_MARKER_CAP,
        }
    }
}

/// Outcome of a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Events replayed through aggregation.
    pub restored: u64,
    /// Chunks the replay was split into.
    pub chunks: u64,
    /// Events selected as map markers.
    pub markers: u64,
}

/// Chunked, yielding replay of cached events.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreCoordinator {
    config: RestoreConfig,
}

impl RestoreCoordinator {
    /// A coordinator with the given settings.
    pub const fn new(config: RestoreConfig) -> Self {
        Self { config }
    }

    /// Replay `events` through `engine` in ascending timestamp order.
    ///
    /// Returns `(restored, chunks)`.
    pub async fn replay(
        &self,
        engine: &RwLock<AggregationEngine>,
        mut events: Vec<Event>,
        clock: &dyn Clock,
    ) -> (u64, u64) {
        events.sort_by_key(|e| e.timestamp);

        let mut restored: u64 = 0;
        let mut chunks: u64 = 0;
        for chunk in events.chunks(self.config.chunk_size.max(1)) {
            {
                let mut engine = engine.write().await;
                let now = clock.now_ms();
                for event in chunk {
                    engine.ingest(event, now);
                }
            }
            restored = restored.saturating_add(u64::try_from(chunk.len()).unwrap_or(0));
            chunks = chunks.saturating_add(1);
            tracing::trace!(chunk = chunks, restored, "Replayed chunk");
            tokio::task::yield_now().await;
        }
        (restored, chunks)
    }

    /// Pick the events to draw as restored map markers.
    ///
    /// Scans newest to oldest, keeping events whose location key is already
    /// kept and admitting new keys until `marker_cap` distinct keys exist.
    /// The selection is returned oldest first.
    pub fn select_markers(&self, events: &[Event]) -> Vec<Event> {
        let mut ordered: Vec<&Event> = events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp);

        let mut keys: HashSet<String> = HashSet::new();
        let mut selected: Vec<Event> = Vec::new();
        for event in ordered.into_iter().rev() {
            let key = event.location_key();
            if keys.contains(&key) {
                selected.push(event.clone());
            } else if keys.len() < self.config.marker_cap {
                keys.insert(key);
                selected.push(event.clone());
            }
        }
        selected.reverse();
        selected
    }
}
