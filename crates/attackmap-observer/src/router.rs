//! Axum router construction for the snapshot API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for the browser front end.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// See [`handlers`] for the REST table. `GET /ws/updates` streams
/// [`DashboardUpdate`](attackmap_types::DashboardUpdate)s.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // WebSocket
        .route("/ws/updates", get(ws::ws_updates))
        // Snapshots
        .route("/api/summary", get(handlers::summary))
        .route("/api/timeline", get(handlers::timeline))
        .route("/api/timeline/granularity", put(handlers::set_granularity))
        .route("/api/heatmap", get(handlers::heatmap))
        .route("/api/top/ips", get(handlers::top_ips))
        .route("/api/top/countries", get(handlers::top_countries))
        .route("/api/protocols", get(handlers::protocols))
        .route("/api/rolling", get(handlers::rolling))
        .route("/api/connection", get(handlers::connection))
        .route("/api/stats", get(handlers::stats))
        .route("/api/events/recent", get(handlers::recent_events))
        // Cache
        .route("/api/cache", delete(handlers::clear_cache))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
