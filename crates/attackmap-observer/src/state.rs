//! Shared application state for the snapshot API.

use std::sync::Arc;
use std::time::Instant;

use attackmap_core::Dashboard;
use attackmap_types::DashboardUpdate;
use tokio::sync::broadcast;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. Every
/// handler reads through the [`Dashboard`]; the API never mutates
/// aggregation state except for granularity and cache clearing.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The dashboard context.
    pub dashboard: Arc<Dashboard>,
    /// When the server state was created.
    pub started_at: Instant,
}

impl AppState {
    /// Create application state around a dashboard.
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        Self {
            dashboard,
            started_at: Instant::now(),
        }
    }

    /// Subscribe to dashboard updates.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.dashboard.subscribe()
    }
}
