//! Event ingestion core of the Attack Map dashboard.
//!
//! Takes normalised [`Event`]s from the transport adapter, persists them,
//! folds them into bounded summaries, and tracks the health of the
//! upstream connection. The snapshot API only ever reads from here.
//!
//! # Modules
//!
//! - [`aggregate`] -- Timeline, heatmap, top-K trackers, protocol and
//!   rolling breakdowns
//! - [`connection`] -- Connection lifecycle state machine and reconnect guard
//! - [`restore`] -- Chunked startup replay and marker selection
//! - [`context`] -- [`Dashboard`], the shared context object
//! - [`schedule`] -- Periodic maintenance tasks
//! - [`config`] -- `attackmap.yaml` loading
//!
//! [`Event`]: attackmap_types::Event
//! [`Dashboard`]: context::Dashboard

pub mod aggregate;
pub mod config;
pub mod connection;
pub mod context;
pub mod restore;
pub mod schedule;

pub use aggregate::{AggregationEngine, EngineConfig};
pub use config::{ConfigError, DashboardConfig};
pub use connection::{ConnectionMonitor, MonitorConfig};
pub use context::{Dashboard, DashboardSettings, IngestOptions};
pub use restore::{RestoreConfig, RestoreCoordinator, RestoreReport};
pub use schedule::{ScheduledTasks, TaskIntervals};
