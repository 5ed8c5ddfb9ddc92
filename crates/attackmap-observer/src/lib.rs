//! Snapshot API server for the Attack Map dashboard.
//!
//! A read-only window onto the [`Dashboard`]: REST endpoints return the
//! current timeline, heatmap, rankings, breakdowns, and connection status,
//! and `GET /ws/updates` pushes every live change. Rendering is left to
//! whatever front end consumes it.
//!
//! [`Dashboard`]: attackmap_core::Dashboard

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
