//! Shared type definitions for the Attack Map dashboard.
//!
//! Every crate in the workspace speaks these types: the store persists
//! [`Event`]s, the core aggregates them into snapshot types, and the
//! observer serves those snapshots. Types flow to `TypeScript` via
//! `ts-rs` for the browser front end.
//!
//! # Modules
//!
//! - [`ids`] -- UUID wrapper for event identity
//! - [`enums`] -- Connection state, socket readiness, granularity, backend
//! - [`event`] -- The normalised attack event and its validation
//! - [`protocol`] -- Protocol normalisation, port mapping, chart colours
//! - [`snapshot`] -- Read-only snapshots served to the presentation layer
//! - [`update`] -- Push updates broadcast to subscribers
//! - [`wire`] -- Upstream `WebSocket` message format
//! - [`clock`] -- Millisecond clock abstraction

pub mod clock;
pub mod enums;
pub mod event;
pub mod ids;
pub mod protocol;
pub mod snapshot;
pub mod update;
pub mod wire;

pub use clock::{Clock, ManualClock, SystemClock};
pub use enums::{ConnectionState, Granularity, SocketReadiness, StorageBackend};
pub use event::{Event, EventError, GeoPoint};
pub use ids::EventId;
pub use protocol::{OTHER, normalize_protocol, port_to_protocol, protocol_color};
pub use snapshot::{
    ConnectionStatus, CountryRanking, DashboardSummary, HeatmapCell, IpRanking, RollingBreakdown,
    ServerStats, TimeBucket,
};
pub use update::DashboardUpdate;
pub use wire::{TrafficMessage, WireMessage, parse_event_time};
