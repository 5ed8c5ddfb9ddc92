//! The dashboard context object.
//!
//! [`Dashboard`] owns the event cache, the aggregation engine, and the
//! connection monitor, and fans out [`DashboardUpdate`]s to subscribers.
//! It is built once at startup and shared as `Arc<Dashboard>` between the
//! transport adapter, the scheduled tasks, and the snapshot API.
//!
//! Engine and monitor mutations happen under short locks that are never
//! held across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use attackmap_store::{CleanupReport, EventStore, StoreError};
use attackmap_types::{
    Clock, ConnectionState, ConnectionStatus, CountryRanking, DashboardSummary, DashboardUpdate,
    Event, Granularity, HeatmapCell, IpRanking, RollingBreakdown, ServerStats, TimeBucket,
};
use tokio::sync::{Mutex, RwLock, broadcast};

use crate::aggregate::{AggregationEngine, EngineConfig};
use crate::config::DashboardConfig;
use crate::connection::{ConnectionMonitor, MonitorConfig};
use crate::restore::{RestoreConfig, RestoreCoordinator, RestoreReport};

/// Capacity of the update broadcast channel.
///
/// A subscriber that falls further behind receives
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
const BROADCAST_CAPACITY: usize = 1024;

/// What to do with an event besides aggregating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Write the event to the cache.
    pub persist: bool,
    /// Publish an [`DashboardUpdate::Event`].
    pub broadcast: bool,
    /// Ask the presentation layer to flash the new row.
    pub highlight: bool,
    /// Ask the presentation layer to play a sound cue.
    pub sound: bool,
}

impl IngestOptions {
    /// A fresh event from the upstream feed.
    pub const fn live() -> Self {
        Self {
            persist: true,
            broadcast: true,
            highlight: true,
            sound: true,
        }
    }

    /// A cached event being replayed: aggregate only.
    pub const fn replay() -> Self {
        Self {
            persist: false,
            broadcast: false,
            highlight: false,
            sound: false,
        }
    }
}

/// Settings for the parts the context owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardSettings {
    /// Aggregation engine settings.
    pub engine: EngineConfig,
    /// Connection monitor thresholds.
    pub monitor: MonitorConfig,
    /// Restore replay settings.
    pub restore: RestoreConfig,
}

impl DashboardSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            engine: config
                .aggregation
                .engine_config(config.store.retention()),
            monitor: config.upstream.monitor_config(),
            restore: config.aggregation.restore_config(),
        }
    }
}

/// Shared state of a running dashboard.
#[derive(Debug)]
pub struct Dashboard {
    store: EventStore,
    engine: RwLock<AggregationEngine>,
    monitor: Mutex<ConnectionMonitor>,
    restoring: AtomicBool,
    server_stats: RwLock<ServerStats>,
    restore: RestoreCoordinator,
    tx: broadcast::Sender<DashboardUpdate>,
    clock: Arc<dyn Clock>,
}

impl Dashboard {
    /// Assemble a dashboard around an opened store.
    pub fn new(store: EventStore, settings: DashboardSettings, clock: Arc<dyn Clock>) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let now = clock.now_ms();
        Self {
            store,
            engine: RwLock::new(AggregationEngine::new(settings.engine, now)),
            monitor: Mutex::new(ConnectionMonitor::new(settings.monitor)),
            restoring: AtomicBool::new(false),
            server_stats: RwLock::new(ServerStats::default()),
            restore: RestoreCoordinator::new(settings.restore),
            tx,
            clock,
        }
    }

    /// Open the cache described by `config` and assemble a dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if neither cache backend can be opened.
    pub async fn open(config: &DashboardConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let store = EventStore::open(&config.store.store_config(), Arc::clone(&clock)).await?;
        Ok(Self::new(store, DashboardSettings::from_config(config), clock))
    }

    /// The event cache.
    pub const fn store(&self) -> &EventStore {
        &self.store
    }

    /// Current time according to the dashboard clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Subscribe to dashboard updates.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.tx.subscribe()
    }

    /// Whether a restore replay is running.
    pub fn is_restoring(&self) -> bool {
        self.restoring.load(Ordering::Acquire)
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Ingest an event from the upstream feed.
    ///
    /// While a restore is running the event is still persisted and
    /// aggregated, but without highlight or sound cues.
    pub async fn ingest_live(&self, event: Event) {
        let options = if self.is_restoring() {
            IngestOptions {
                highlight: false,
                sound: false,
                ..IngestOptions::live()
            }
        } else {
            IngestOptions::live()
        };
        self.ingest(event, options).await;
    }

    /// Ingest an event with explicit side effects.
    ///
    /// Events failing [`Event::validate`] are dropped before they reach the
    /// cache or the aggregates.
    pub async fn ingest(&self, event: Event, options: IngestOptions) {
        if let Err(e) = event.validate() {
            tracing::debug!(error = %e, event_id = %event.id, "Dropping malformed event");
            return;
        }
        let now = self.clock.now_ms();
        let event = if options.persist {
            let stamped = event.with_cached_at(now);
            self.store.store(&stamped).await;
            stamped
        } else {
            event
        };

        self.engine.write().await.ingest(&event, now);

        if options.broadcast {
            self.publish(DashboardUpdate::Event {
                event,
                highlight: options.highlight,
                sound: options.sound,
            });
        }
    }

    /// Replay every retained cached event through aggregation and restore
    /// markers.
    ///
    /// Retention cleanup runs first; a cleanup failure is logged and events
    /// past the retention cutoff are skipped regardless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the cache cannot be read; nothing is
    /// aggregated in that case.
    pub async fn restore_all(&self) -> Result<RestoreReport, StoreError> {
        self.restoring.store(true, Ordering::Release);
        let result = self.run_restore().await;
        self.restoring.store(false, Ordering::Release);

        match &result {
            Ok(report) => {
                tracing::info!(
                    restored = report.restored,
                    chunks = report.chunks,
                    markers = report.markers,
                    "Restore complete"
                );
                self.publish(DashboardUpdate::Restored {
                    restored: report.restored,
                });
            }
            Err(e) => tracing::warn!(error = %e, "Restore failed"),
        }
        result
    }

    async fn run_restore(&self) -> Result<RestoreReport, StoreError> {
        if let Err(e) = self.store.cleanup().await {
            tracing::warn!(error = %e, "Pre-restore cleanup failed");
        }
        let cutoff = self.store.retention().cutoff(self.clock.now_ms());
        let mut events = self.store.load_all().await?;
        events.retain(|e| e.timestamp > cutoff);
        tracing::info!(events = events.len(), "Restoring cached events");

        let markers = self.restore.select_markers(&events);
        let (restored, chunks) = self
            .restore
            .replay(&self.engine, events, self.clock.as_ref())
            .await;

        let marker_count = u64::try_from(markers.len()).unwrap_or(0);
        for event in markers {
            self.publish(DashboardUpdate::MarkerRestored { event });
        }

        Ok(RestoreReport {
            restored,
            chunks,
            markers: marker_count,
        })
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Advance the timeline and rescan the rolling breakdown.
    pub async fn refresh(&self) {
        let now = self.clock.now_ms();
        self.engine.write().await.refresh(now);
    }

    /// Apply the cache retention policy.
    ///
    /// # Errors
    ///
    /// Returns the cache's [`StoreError`].
    pub async fn cleanup(&self) -> Result<CleanupReport, StoreError> {
        self.store.cleanup().await
    }

    /// Drop every cached event.
    ///
    /// Aggregated summaries are kept; only the cache is emptied.
    ///
    /// # Errors
    ///
    /// Returns the cache's [`StoreError`] so the caller can notify the user.
    pub async fn clear_cache(&self) -> Result<u64, StoreError> {
        let removed = self.store.clear().await?;
        self.publish(DashboardUpdate::CacheCleared);
        Ok(removed)
    }

    /// Merge a `Stats` message from the upstream server.
    ///
    /// Fields absent from the message keep their previous value.
    pub async fn record_server_stats(&self, stats: ServerStats) {
        let merged = {
            let mut current = self.server_stats.write().await;
            current.last_1m = stats.last_1m.or(current.last_1m);
            current.last_1h = stats.last_1h.or(current.last_1h);
            current.last_24h = stats.last_24h.or(current.last_24h);
            *current
        };
        self.publish(DashboardUpdate::Stats { stats: merged });
    }

    /// Switch the timeline granularity.
    pub async fn set_granularity(&self, granularity: Granularity) {
        let now = self.clock.now_ms();
        self.engine.write().await.set_granularity(granularity, now);
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// The upstream socket opened.
    pub async fn connection_opened(&self) {
        let now = self.clock.now_ms();
        self.with_monitor(|m| m.on_open(now)).await;
    }

    /// A valid upstream message arrived.
    pub async fn connection_data(&self) {
        let now = self.clock.now_ms();
        self.with_monitor(|m| m.on_data(now)).await;
    }

    /// The upstream socket closed. Returns the reconnect delay, if any.
    pub async fn connection_closed(&self, code: u16) -> Option<Duration> {
        self.with_monitor(|m| m.on_close(code)).await
    }

    /// The upstream transport failed. Returns the reconnect delay, if any.
    pub async fn connection_error(&self) -> Option<Duration> {
        self.with_monitor(ConnectionMonitor::on_error).await
    }

    /// Start the pending reconnect; `false` if none is pending.
    pub async fn begin_reconnect(&self) -> bool {
        self.with_monitor(ConnectionMonitor::begin_attempt).await
    }

    /// Periodic reclassification of the connection state.
    pub async fn poll_connection(&self) -> ConnectionState {
        let now = self.clock.now_ms();
        self.with_monitor(|m| m.evaluate(now)).await
    }

    /// Periodic staleness check; returns whether data is stale.
    pub async fn heartbeat(&self) -> bool {
        let now = self.clock.now_ms();
        self.monitor.lock().await.heartbeat(now)
    }

    /// Run `f` against the monitor and publish any state change.
    async fn with_monitor<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut ConnectionMonitor) -> T,
    {
        let (out, before, after) = {
            let mut monitor = self.monitor.lock().await;
            let before = monitor.state();
            let out = f(&mut monitor);
            (out, before, monitor.state())
        };
        if before != after {
            self.publish(DashboardUpdate::Connection { state: after });
        }
        out
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// The timeline window, oldest bucket first.
    pub async fn timeline_series(&self) -> Vec<TimeBucket> {
        self.engine.read().await.timeline_series()
    }

    /// The 24 hour-of-day heatmap slots.
    pub async fn heatmap(&self) -> Vec<HeatmapCell> {
        self.engine.read().await.heatmap()
    }

    /// Busiest attacker addresses, at most `min(limit, 100)`.
    pub async fn top_ips(&self, limit: usize) -> Vec<IpRanking> {
        self.engine.read().await.top_ips(limit)
    }

    /// Busiest attacker countries, at most `min(limit, 100)`.
    pub async fn top_countries(&self, limit: usize) -> Vec<CountryRanking> {
        self.engine.read().await.top_countries(limit)
    }

    /// Cumulative events per protocol.
    pub async fn protocol_histogram(&self) -> BTreeMap<String, u64> {
        self.engine.read().await.protocol_histogram()
    }

    /// Last rolling breakdown.
    pub async fn rolling_breakdown(&self) -> RollingBreakdown {
        self.engine.read().await.rolling_breakdown()
    }

    /// Current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.monitor.lock().await.state()
    }

    /// Detailed connection status.
    pub async fn connection_status(&self) -> ConnectionStatus {
        let now = self.clock.now_ms();
        self.monitor.lock().await.status(now)
    }

    /// Latest upstream totals.
    pub async fn server_stats(&self) -> ServerStats {
        *self.server_stats.read().await
    }

    /// Top-level counters.
    pub async fn summary(&self) -> DashboardSummary {
        let (total_ingested, granularity) = {
            let engine = self.engine.read().await;
            (engine.total_ingested(), engine.granularity())
        };
        let cached_events = match self.store.len().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count cached events");
                0
            }
        };
        DashboardSummary {
            total_ingested,
            cached_events,
            backend: self.store.backend_kind(),
            connection: self.connection_state().await,
            restoring: self.is_restoring(),
            granularity,
        }
    }

    fn publish(&self, update: DashboardUpdate) {
        // Err only means no subscriber is listening.
        let _ = self.tx.send(update);
    }
}
