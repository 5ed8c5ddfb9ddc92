//! The streaming aggregation engine.
//!
//! Live ingestion and restore replay go through the same
//! [`AggregationEngine::ingest`], so replaying stored events in timestamp
//! order reproduces the live state exactly.

use std::collections::{BTreeMap, VecDeque};

use attackmap_store::RetentionPolicy;
use attackmap_types::{
    CountryRanking, Event, Granularity, HeatmapCell, IpRanking, RollingBreakdown, TimeBucket,
};

use super::heatmap::Heatmap;
use super::rolling;
use super::timeline::Timeline;
use super::top_k::{CountryKey, TopKTracker, country_ranking, ip_ranking};

/// Default width of the rolling breakdown: 15 minutes.
pub const DEFAULT_ROLLING_WINDOW_MS: i64 = 900_000;

/// Default maximum rows returned by a top-K read.
pub const DEFAULT_TOP_K_CAP: usize = 100;

/// Aggregation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Initial timeline granularity.
    pub granularity: Granularity,
    /// Width of the rolling breakdown.
    pub rolling_window_ms: i64,
    /// Maximum rows returned by a top-K read.
    pub top_k_cap: usize,
    /// Bound on the retained history used for rescans and rebuilds.
    pub retention: RetentionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            rolling_window_ms: DEFAULT_ROLLING_WINDOW_MS,
            top_k_cap: DEFAULT_TOP_K_CAP,
            retention: RetentionPolicy::default(),
        }
    }
}

/// Bounded, continuously updated summaries of the event stream.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    config: EngineConfig,
    timeline: Timeline,
    heatmap: Heatmap,
    ips: TopKTracker<String>,
    countries: TopKTracker<CountryKey>,
    protocols: BTreeMap<String, u64>,
    history: VecDeque<Event>,
    rolling: RollingBreakdown,
    total_ingested: u64,
}

impl AggregationEngine {
    /// An empty engine whose timeline ends at `now_ms`.
    pub fn new(config: EngineConfig, now_ms: i64) -> Self {
        Self {
            timeline: Timeline::new(config.granularity, now_ms),
            heatmap: Heatmap::default(),
            ips: TopKTracker::default(),
            countries: TopKTracker::default(),
            protocols: BTreeMap::new(),
            history: VecDeque::new(),
            rolling: RollingBreakdown {
                window_ms: config.rolling_window_ms,
                ..RollingBreakdown::default()
            },
            total_ingested: 0,
            config,
        }
    }

    /// Fold one event into every summary.
    pub fn ingest(&mut self, event: &Event, now_ms: i64) {
        self.timeline.advance(now_ms);
        if !self.timeline.record(event.timestamp) {
            tracing::trace!(
                timestamp = event.timestamp,
                window_start = self.timeline.start_ms(),
                "Event predates the timeline window"
            );
        }
        self.heatmap.record(event.timestamp);
        self.ips.record(event.source_ip.clone(), event);
        self.countries.record(CountryKey::from(event), event);
        if let Some(n) = self.protocols.get_mut(&event.protocol) {
            *n = n.saturating_add(1);
        } else {
            self.protocols.insert(event.protocol.clone(), 1);
        }

        self.history.push_back(event.clone());
        while self.history.len() > self.config.retention.max_count {
            self.history.pop_front();
        }
        self.total_ingested = self.total_ingested.saturating_add(1);
    }

    /// Slide the timeline forward to `now_ms` with no new event.
    pub fn advance(&mut self, now_ms: i64) {
        self.timeline.advance(now_ms);
    }

    /// Periodic refresh: advance the timeline, prune history to the
    /// retention window, and rescan the rolling breakdown.
    pub fn refresh(&mut self, now_ms: i64) {
        self.advance(now_ms);
        let cutoff = self.config.retention.cutoff(now_ms);
        self.history.retain(|e| e.timestamp > cutoff);
        self.rolling = rolling::compute(&self.history, now_ms, self.config.rolling_window_ms);
    }

    /// Switch granularity, rebuilding the timeline from retained history.
    pub fn set_granularity(&mut self, granularity: Granularity, now_ms: i64) {
        if granularity == self.timeline.granularity() {
            self.advance(now_ms);
            return;
        }
        self.timeline =
            Timeline::rebuild(granularity, now_ms, self.history.iter().map(|e| e.timestamp));
        tracing::debug!(?granularity, "Timeline granularity changed");
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Active timeline granularity.
    pub const fn granularity(&self) -> Granularity {
        self.timeline.granularity()
    }

    /// The timeline window, oldest bucket first.
    pub fn timeline_series(&self) -> Vec<TimeBucket> {
        self.timeline.series()
    }

    /// The 24 hour-of-day slots.
    pub fn heatmap(&self) -> Vec<HeatmapCell> {
        self.heatmap.cells()
    }

    /// Busiest attacker addresses.
    pub fn top_ips(&self, limit: usize) -> Vec<IpRanking> {
        self.ips
            .top(limit, self.config.top_k_cap)
            .into_iter()
            .map(|(ip, entry)| ip_ranking(ip, entry))
            .collect()
    }

    /// Busiest attacker countries.
    pub fn top_countries(&self, limit: usize) -> Vec<CountryRanking> {
        self.countries
            .top(limit, self.config.top_k_cap)
            .into_iter()
            .map(|(key, entry)| country_ranking(key, entry))
            .collect()
    }

    /// Cumulative events per protocol since launch.
    pub fn protocol_histogram(&self) -> BTreeMap<String, u64> {
        self.protocols.clone()
    }

    /// Last computed rolling breakdown.
    pub fn rolling_breakdown(&self) -> RollingBreakdown {
        self.rolling.clone()
    }

    /// Events folded in since launch.
    pub const fn total_ingested(&self) -> u64 {
        self.total_ingested
    }

    /// Events currently retained for rescans.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    /// 2024-01-01T12:00:00Z.
    const NOW: i64 = 1_704_110_400_000;

    fn engine() -> AggregationEngine {
        AggregationEngine::new(EngineConfig::default(), NOW)
    }

    #[test]
    fn three_hits_from_one_attacker() {
        let mut engine = engine();
        for (protocol, offset) in [("SSH", 240_000), ("SSH", 120_000), ("HTTP", 0)] {
            let event = Event::new("1.2.3.4", "H1", protocol, NOW - offset);
            engine.ingest(&event, NOW);
        }

        let histogram = engine.protocol_histogram();
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.get("SSH"), Some(&2));
        assert_eq!(histogram.get("HTTP"), Some(&1));

        let top = engine.top_ips(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].ip, "1.2.3.4");
        assert_eq!(top[0].hits, 3);
        assert_eq!(top[0].last_protocol, "HTTP");
    }

    #[test]
    fn timeline_and_heatmap_follow_ingest() {
        let mut engine = engine();
        engine.ingest(&Event::new("a", "H1", "SSH", NOW - 30_000), NOW);
        engine.ingest(&Event::new("b", "H1", "SSH", NOW), NOW);

        let series = engine.timeline_series();
        assert_eq!(series.len(), 60);
        assert_eq!(series[58].count, 1);
        assert_eq!(series[59].count, 1);
        assert_eq!(engine.heatmap()[11].attacks, 1);
        assert_eq!(engine.heatmap()[12].attacks, 1);
    }

    #[test]
    fn refresh_rescans_rolling_window_and_prunes_history() {
        let config = EngineConfig {
            retention: RetentionPolicy {
                window_ms: 3_600_000,
                max_count: 10,
            },
            ..EngineConfig::default()
        };
        let mut engine = AggregationEngine::new(config, NOW);
        engine.ingest(&Event::new("a", "H1", "SSH", NOW - 7_200_000), NOW);
        engine.ingest(&Event::new("b", "H1", "SSH", NOW - 1_000_000), NOW);
        engine.ingest(&Event::new("c", "H1", "HTTP", NOW - 5_000), NOW);

        engine.refresh(NOW);
        assert_eq!(engine.history_len(), 2);

        let rolling = engine.rolling_breakdown();
        assert_eq!(rolling.total, 1);
        assert_eq!(rolling.protocols.get("HTTP"), Some(&1));
        assert_eq!(rolling.window_ms, DEFAULT_ROLLING_WINDOW_MS);

        // Cumulative totals are not affected by pruning.
        assert_eq!(engine.protocol_histogram().get("SSH"), Some(&2));
    }

    #[test]
    fn history_is_bounded_by_count() {
        let config = EngineConfig {
            retention: RetentionPolicy {
                window_ms: 86_400_000,
                max_count: 3,
            },
            ..EngineConfig::default()
        };
        let mut engine = AggregationEngine::new(config, NOW);
        for i in 0..5 {
            engine.ingest(&Event::new("a", "H1", "SSH", NOW - 10 + i), NOW);
        }
        assert_eq!(engine.history_len(), 3);
        assert_eq!(engine.total_ingested(), 5);
    }

    #[test]
    fn granularity_switch_rebuilds_from_history() {
        let mut engine = engine();
        engine.ingest(&Event::new("a", "H1", "SSH", NOW - 2 * 3_600_000), NOW);
        engine.ingest(&Event::new("b", "H1", "SSH", NOW - 10_000), NOW);
        // Two hours back is outside the minute window.
        assert_eq!(engine.timeline_series().iter().map(|b| b.count).sum::<u64>(), 1);

        engine.set_granularity(Granularity::Hour, NOW);
        let series = engine.timeline_series();
        assert_eq!(series.len(), 24);
        assert_eq!(series.iter().map(|b| b.count).sum::<u64>(), 2);
        assert_eq!(engine.granularity(), Granularity::Hour);
    }

    #[test]
    fn top_countries_rank_by_hits() {
        let mut engine = engine();
        let fr = |ip: &str| Event::new(ip, "H1", "SSH", NOW).with_country("France", "FR");
        let cn = |ip: &str| Event::new(ip, "H1", "SSH", NOW).with_country("China", "CN");
        for event in [cn("a"), fr("b"), fr("c")] {
            engine.ingest(&event, NOW);
        }
        let top = engine.top_countries(10);
        assert_eq!(top[0].country, "France");
        assert_eq!(top[0].country_code, "FR");
        assert_eq!(top[0].hits, 2);
        assert_eq!(top[1].country, "China");
    }
}
