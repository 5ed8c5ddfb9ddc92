//! Rolling protocol and country breakdown.
//!
//! Recomputed from scratch by scanning the retained history on each
//! refresh rather than maintained incrementally.

use std::collections::BTreeMap;

use attackmap_types::{Event, RollingBreakdown};

use super::top_k::country_name;

/// Count protocols and countries of events with `timestamp > now - window_ms`.
pub fn compute<'a, I>(history: I, now_ms: i64, window_ms: i64) -> RollingBreakdown
where
    I: IntoIterator<Item = &'a Event>,
{
    let cutoff = now_ms.saturating_sub(window_ms);
    let mut protocols: BTreeMap<String, u64> = BTreeMap::new();
    let mut countries: BTreeMap<String, u64> = BTreeMap::new();
    let mut total: u64 = 0;

    for event in history.into_iter().filter(|e| e.timestamp > cutoff) {
        bump(&mut protocols, &event.protocol);
        bump(&mut countries, country_name(event));
        total = total.saturating_add(1);
    }

    RollingBreakdown {
        window_ms,
        computed_at: now_ms,
        protocols,
        countries,
        total,
    }
}

fn bump(counts: &mut BTreeMap<String, u64>, key: &str) {
    if let Some(n) = counts.get_mut(key) {
        *n = n.saturating_add(1);
    } else {
        counts.insert(key.to_owned(), 1);
    }
}
