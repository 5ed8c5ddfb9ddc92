//! Fixed-length sliding timeline histogram.
//!
//! The window always holds exactly [`Granularity::bucket_count`]
//! contiguous buckets, the last one containing "now" rounded down to the
//! granularity. Bucket lookup is arithmetic against the first bucket's
//! start, so placing an event never scans.

use std::collections::VecDeque;

use attackmap_types::{Granularity, TimeBucket};

/// Sliding window of per-bucket event counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    granularity: Granularity,
    /// Start of the first (oldest) bucket, epoch ms.
    start_ms: i64,
    counts: VecDeque<u64>,
}

impl Timeline {
    /// An empty window ending at the bucket that contains `now_ms`.
    pub fn new(granularity: Granularity, now_ms: i64) -> Self {
        let count = granularity.bucket_count();
        Self {
            granularity,
            start_ms: first_start(granularity, granularity.floor(now_ms)),
            counts: std::iter::repeat_n(0, count).collect(),
        }
    }

    /// Rebuild from scratch for `granularity`, replaying `timestamps`.
    pub fn rebuild<I>(granularity: Granularity, now_ms: i64, timestamps: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut timeline = Self::new(granularity, now_ms);
        for ts in timestamps {
            timeline.record(ts);
        }
        timeline
    }

    /// Active bucket width.
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Start of the oldest bucket.
    pub const fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// Start of the newest bucket.
    pub fn last_start_ms(&self) -> i64 {
        self.start_ms
            .saturating_add(self.step().saturating_mul(self.span_steps()))
    }

    /// Slide the window forward so its last bucket contains `now_ms`.
    ///
    /// Each step evicts the oldest bucket and appends an empty one. A jump
    /// of a full window or more is a reset. Never moves backwards.
    pub fn advance(&mut self, now_ms: i64) {
        let target = self.granularity.floor(now_ms);
        let last = self.last_start_ms();
        if target <= last {
            return;
        }

        let steps = target
            .saturating_sub(last)
            .checked_div(self.step())
            .unwrap_or(0);
        let count = self.counts.len();
        match usize::try_from(steps) {
            Ok(n) if n < count => {
                for _ in 0..n {
                    self.counts.pop_front();
                    self.counts.push_back(0);
                }
                self.start_ms = self.start_ms.saturating_add(steps.saturating_mul(self.step()));
            }
            _ => {
                self.counts.iter_mut().for_each(|c| *c = 0);
                self.start_ms = first_start(self.granularity, target);
            }
        }
    }

    /// Count one event at `ts_ms`.
    ///
    /// Events past the newest bucket slide the window forward first.
    /// Events before the oldest bucket are not counted; returns `false`.
    pub fn record(&mut self, ts_ms: i64) -> bool {
        if ts_ms < self.start_ms {
            return false;
        }
        self.advance(ts_ms);

        let offset = self
            .granularity
            .floor(ts_ms)
            .saturating_sub(self.start_ms)
            .checked_div(self.step())
            .unwrap_or(0);
        let slot = usize::try_from(offset)
            .ok()
            .and_then(|idx| self.counts.get_mut(idx));
        match slot {
            Some(count) => {
                *count = count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Total events currently inside the window.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The window as labelled buckets, oldest first.
    pub fn series(&self) -> Vec<TimeBucket> {
        let step = self.step();
        let mut start = self.start_ms;
        self.counts
            .iter()
            .map(|&count| {
                let bucket = TimeBucket {
                    bucket_start: start,
                    label: self.granularity.label(start),
                    count,
                    granularity: self.granularity,
                };
                start = start.saturating_add(step);
                bucket
            })
            .collect()
    }

    const fn step(&self) -> i64 {
        self.granularity.step_ms()
    }

    fn span_steps(&self) -> i64 {
        i64::try_from(self.counts.len().saturating_sub(1)).unwrap_or(0)
    }
}

/// Start of the first bucket of a window whose last bucket starts at `last_start`.
fn first_start(granularity: Granularity, last_start: i64) -> i64 {
    let span = i64::try_from(granularity.bucket_count().saturating_sub(1)).unwrap_or(0);
    last_start.saturating_sub(granularity.step_ms().saturating_mul(span))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    /// 2024-01-01T12:00:00Z.
    const NOON: i64 = 1_704_110_400_000;

    #[test]
    fn window_has_fixed_length_per_granularity() {
        for (g, n) in [
            (Granularity::Second, 60),
            (Granularity::Minute, 60),
            (Granularity::Hour, 24),
        ] {
            let mut timeline = Timeline::new(g, NOON + 1_234);
            assert_eq!(timeline.series().len(), n);
            timeline.advance(NOON + 7 * g.step_ms());
            assert_eq!(timeline.series().len(), n);
            timeline.advance(NOON + 1_000 * g.step_ms());
            assert_eq!(timeline.series().len(), n);
        }
    }

    #[test]
    fn last_bucket_contains_now() {
        let timeline = Timeline::new(Granularity::Minute, NOON + 59_999);
        let series = timeline.series();
        assert_eq!(series[59].bucket_start, NOON);
        assert_eq!(series[59].label, "12:00");
        assert_eq!(series[0].label, "11:01");
    }

    #[test]
    fn buckets_are_contiguous() {
        let timeline = Timeline::new(Granularity::Second, NOON);
        let series = timeline.series();
        for pair in series.windows(2) {
            assert_eq!(pair[1].bucket_start - pair[0].bucket_start, 1_000);
        }
    }

    #[test]
    fn advancing_evicts_oldest_bucket() {
        let mut timeline = Timeline::new(Granularity::Minute, NOON);
        assert!(timeline.record(timeline.start_ms()));
        assert!(timeline.record(NOON));
        assert_eq!(timeline.total(), 2);

        timeline.advance(NOON + 60_000);
        let series = timeline.series();
        assert_eq!(series[58].count, 1);
        assert_eq!(series[59].count, 0);
        assert_eq!(timeline.total(), 1);
    }

    #[test]
    fn future_event_synthesises_buckets() {
        let mut timeline = Timeline::new(Granularity::Second, NOON);
        timeline.record(NOON);
        assert!(timeline.record(NOON + 3_500));

        let series = timeline.series();
        assert_eq!(series[59].bucket_start, NOON + 3_000);
        assert_eq!(series[59].count, 1);
        assert_eq!(series[56].count, 1);
    }

    #[test]
    fn gap_of_full_window_resets() {
        let mut timeline = Timeline::new(Granularity::Second, NOON);
        timeline.record(NOON);
        timeline.advance(NOON + 60_000);
        assert_eq!(timeline.total(), 0);
        assert_eq!(timeline.series()[59].bucket_start, NOON + 60_000);
    }

    #[test]
    fn stale_event_is_dropped() {
        let mut timeline = Timeline::new(Granularity::Second, NOON);
        assert!(!timeline.record(NOON - 60_000));
        assert_eq!(timeline.total(), 0);
    }

    #[test]
    fn advance_never_moves_backwards() {
        let mut timeline = Timeline::new(Granularity::Minute, NOON);
        let before = timeline.clone();
        timeline.advance(NOON - 3_600_000);
        assert_eq!(timeline, before);
    }
}
