//! Streaming aggregation of attack events into bounded summaries.
//!
//! - [`timeline`] -- fixed-length sliding histogram
//! - [`heatmap`] -- hour-of-day counts and intensities
//! - [`top_k`] -- hit-count trackers by IP and by country
//! - [`rolling`] -- rolling protocol and country breakdown
//! - [`engine`] -- the engine tying them together

pub mod engine;
pub mod heatmap;
pub mod rolling;
pub mod timeline;
pub mod top_k;

pub use engine::{AggregationEngine, DEFAULT_ROLLING_WINDOW_MS, DEFAULT_TOP_K_CAP, EngineConfig};
pub use heatmap::Heatmap;
pub use timeline::Timeline;
pub use top_k::{CountryKey, TopKTracker, TrackerEntry, UNKNOWN_COUNTRY};
