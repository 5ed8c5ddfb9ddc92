//! Hit-count trackers ranked for display.
//!
//! Trackers are unbounded in memory; only reads are truncated. Ties in hit
//! count keep first-seen order, so a replay of the same events always ranks
//! identically.

use std::collections::HashMap;
use std::hash::Hash;

use attackmap_types::{CountryRanking, Event, IpRanking};

/// Country name used when an event carries none.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Running totals for one tracked key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerEntry {
    /// Total hits.
    pub hits: u64,
    /// Earliest event timestamp.
    pub first_seen: i64,
    /// Latest event timestamp.
    pub last_seen: i64,
    /// Protocol of the latest event.
    pub last_protocol: String,
    /// Country of the latest event.
    pub last_country: String,
    /// Latest non-empty reputation label.
    pub reputation: Option<String>,
    /// Position in first-seen order.
    order: u64,
}

/// Hit counter keyed by `K`.
#[derive(Debug, Clone)]
pub struct TopKTracker<K> {
    entries: HashMap<K, TrackerEntry>,
    next_order: u64,
}

impl<K> Default for TopKTracker<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_order: 0,
        }
    }
}

impl<K: Eq + Hash> TopKTracker<K> {
    /// Count one hit of `key` from `event`.
    pub fn record(&mut self, key: K, event: &Event) {
        let order = self.next_order;
        let entry = self.entries.entry(key).or_insert_with(|| TrackerEntry {
            hits: 0,
            first_seen: event.timestamp,
            last_seen: event.timestamp,
            last_protocol: event.protocol.clone(),
            last_country: country_name(event).to_owned(),
            reputation: None,
            order,
        });
        if entry.order == order {
            self.next_order = self.next_order.saturating_add(1);
        }

        entry.hits = entry.hits.saturating_add(1);
        entry.first_seen = entry.first_seen.min(event.timestamp);
        if event.timestamp >= entry.last_seen {
            entry.last_seen = event.timestamp;
            event.protocol.clone_into(&mut entry.last_protocol);
            country_name(event).clone_into(&mut entry.last_country);
        }
        if let Some(rep) = event.reputation.as_deref().filter(|r| !r.is_empty()) {
            entry.reputation = Some(rep.to_owned());
        }
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up one key.
    pub fn get(&self, key: &K) -> Option<&TrackerEntry> {
        self.entries.get(key)
    }

    /// Entries by hits descending, then first-seen order, truncated to
    /// `min(limit, cap)`.
    pub fn top(&self, limit: usize, cap: usize) -> Vec<(&K, &TrackerEntry)> {
        let mut ranked: Vec<(&K, &TrackerEntry)> = self.entries.iter().collect();
        ranked.sort_unstable_by(|(_, a), (_, b)| b.hits.cmp(&a.hits).then(a.order.cmp(&b.order)));
        ranked.truncate(limit.min(cap));
        ranked
    }
}

/// Key of the per-country tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountryKey {
    /// Country name.
    pub name: String,
    /// ISO country code.
    pub code: String,
}

impl From<&Event> for CountryKey {
    fn from(event: &Event) -> Self {
        Self {
            name: country_name(event).to_owned(),
            code: event.country_code.clone(),
        }
    }
}

/// The event's country name, or [`UNKNOWN_COUNTRY`].
pub fn country_name(event: &Event) -> &str {
    if event.country.trim().is_empty() {
        UNKNOWN_COUNTRY
    } else {
        &event.country
    }
}

/// Project an IP tracker row into its snapshot form.
pub fn ip_ranking(ip: &str, entry: &TrackerEntry) -> IpRanking {
    IpRanking {
        ip: ip.to_owned(),
        hits: entry.hits,
        first_seen: entry.first_seen,
        last_seen: entry.last_seen,
        last_protocol: entry.last_protocol.clone(),
        reputation: entry.reputation.clone(),
        country: entry.last_country.clone(),
    }
}

/// Project a country tracker row into its snapshot form.
pub fn country_ranking(key: &CountryKey, entry: &TrackerEntry) -> CountryRanking {
    CountryRanking {
        country: key.name.clone(),
        country_code: key.code.clone(),
        hits: entry.hits,
        first_seen: entry.first_seen,
        last_seen: entry.last_seen,
        last_protocol: entry.last_protocol.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;

    fn hit(ip: &str, protocol: &str, ts: i64) -> Event {
        Event::new(ip, "Cowrie", protocol, ts)
    }

    #[test]
    fn counts_and_tracks_latest_protocol() {
        let mut tracker = TopKTracker::default();
        for event in [hit("a", "SSH", 10), hit("a", "HTTP", 30), hit("a", "FTP", 20)] {
            tracker.record(event.source_ip.clone(), &event);
        }
        let entry = tracker.get(&"a".to_owned()).cloned();
        let entry = entry.unwrap_or_else(|| panic!("missing entry"));
        assert_eq!(entry.hits, 3);
        assert_eq!(entry.first_seen, 10);
        assert_eq!(entry.last_seen, 30);
        assert_eq!(entry.last_protocol, "HTTP");
        assert_eq!(entry.last_country, UNKNOWN_COUNTRY);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let mut tracker = TopKTracker::default();
        for (ip, ts) in [("c", 1), ("a", 2), ("b", 3), ("a", 4), ("b", 5), ("c", 6)] {
            tracker.record(ip.to_owned(), &hit(ip, "SSH", ts));
        }
        let order: Vec<&str> = tracker
            .top(10, 100)
            .into_iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn reads_are_capped() {
        let mut tracker = TopKTracker::default();
        for i in 0..150 {
            let ip = format!("10.0.0.{i}");
            tracker.record(ip.clone(), &hit(&ip, "SSH", i));
        }
        assert_eq!(tracker.len(), 150);
        assert_eq!(tracker.top(500, 100).len(), 100);
        assert_eq!(tracker.top(5, 100).len(), 5);
    }

    #[test]
    fn reputation_keeps_latest_label() {
        let mut tracker = TopKTracker::default();
        let first = hit("a", "SSH", 1).with_reputation("Mass Scanner");
        let second = hit("a", "SSH", 2);
        tracker.record("a".to_owned(), &first);
        tracker.record("a".to_owned(), &second);
        let top = tracker.top(1, 100);
        assert_eq!(top[0].1.reputation.as_deref(), Some("Mass Scanner"));
    }

    #[test]
    fn country_key_defaults_unknown() {
        let event = hit("a", "SSH", 1);
        assert_eq!(CountryKey::from(&event).name, UNKNOWN_COUNTRY);
        let event = event.with_country("France", "FR");
        assert_eq!(
            CountryKey::from(&event),
            CountryKey {
                name: "France".to_owned(),
                code: "FR".to_owned(),
            }
        );
    }
}
