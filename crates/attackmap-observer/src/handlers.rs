//! REST endpoint handlers for the snapshot API.
//!
//! Every handler reads through the shared [`Dashboard`] and returns an
//! owned snapshot; no lock is held while the response is serialized.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness |
//! | `GET` | `/api/summary` | Totals, backend, connection, restore flag |
//! | `GET` | `/api/timeline` | Timeline buckets |
//! | `PUT` | `/api/timeline/granularity` | Switch timeline granularity |
//! | `GET` | `/api/heatmap` | Hour-of-day heatmap |
//! | `GET` | `/api/top/ips` | Top attacker addresses |
//! | `GET` | `/api/top/countries` | Top attacker countries |
//! | `GET` | `/api/protocols` | Cumulative protocol histogram |
//! | `GET` | `/api/rolling` | Rolling protocol/country breakdown |
//! | `GET` | `/api/connection` | Connection state and diagnostics |
//! | `GET` | `/api/stats` | Latest upstream totals |
//! | `GET` | `/api/events/recent` | Cached events in a recent window |
//! | `DELETE` | `/api/cache` | Clear the event cache |
//!
//! [`Dashboard`]: attackmap_core::Dashboard

use std::sync::Arc;

use attackmap_types::{Granularity, protocol_color};
use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;

use crate::error::ObserverError;
use crate::state::AppState;

/// Rows returned by a top-K read when no limit is given.
const DEFAULT_TOP_LIMIT: usize = 10;

/// Window of `/api/events/recent` when none is given: one minute.
const DEFAULT_RECENT_WINDOW_MS: i64 = 60_000;

/// Rows returned by `/api/events/recent` when no limit is given.
const DEFAULT_RECENT_LIMIT: usize = 100;

/// Hard cap on `/api/events/recent` rows.
const MAX_RECENT_LIMIT: usize = 1_000;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the top-K endpoints.
#[derive(Debug, serde::Deserialize)]
pub struct TopQuery {
    /// Maximum rows (capped at 100 by the engine).
    pub limit: Option<usize>,
}

/// Query parameters for `GET /api/events/recent`.
#[derive(Debug, serde::Deserialize)]
pub struct RecentQuery {
    /// Look-back window in milliseconds (default one minute).
    pub window_ms: Option<i64>,
    /// Maximum rows (default 100, at most 1000).
    pub limit: Option<usize>,
}

/// Body of `PUT /api/timeline/granularity`.
#[derive(Debug, serde::Deserialize)]
pub struct GranularityRequest {
    /// `second`, `minute`, or `hour`.
    pub granularity: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_ms = u64::try_from(state.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    Json(serde_json::json!({
        "status": "ok",
        "uptime_ms": uptime_ms,
    }))
}

/// Top-level counters.
pub async fn summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.summary().await)
}

/// The timeline window, oldest bucket first.
pub async fn timeline(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let buckets = state.dashboard.timeline_series().await;
    let granularity = buckets
        .first()
        .map_or_else(Granularity::default, |b| b.granularity);
    Json(serde_json::json!({
        "granularity": granularity,
        "buckets": buckets,
    }))
}

/// Switch the timeline granularity and return the rebuilt window.
pub async fn set_granularity(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GranularityRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let granularity: Granularity = body
        .granularity
        .parse()
        .map_err(ObserverError::InvalidQuery)?;
    state.dashboard.set_granularity(granularity).await;
    tracing::info!(?granularity, "Granularity changed via API");
    Ok(timeline(State(state)).await)
}

/// Hour-of-day heatmap.
pub async fn heatmap(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.heatmap().await)
}

/// Busiest attacker addresses.
pub async fn top_ips(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    Json(state.dashboard.top_ips(limit).await)
}

/// Busiest attacker countries.
pub async fn top_countries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    Json(state.dashboard.top_countries(limit).await)
}

/// Cumulative protocol counts with chart colours, busiest first.
pub async fn protocols(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut rows: Vec<(String, u64)> = state
        .dashboard
        .protocol_histogram()
        .await
        .into_iter()
        .collect();
    rows.sort_by(|(pa, a), (pb, b)| b.cmp(a).then_with(|| pa.cmp(pb)));

    let protocols: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|(protocol, count)| {
            serde_json::json!({
                "color": protocol_color(&protocol),
                "protocol": protocol,
                "count": count,
            })
        })
        .collect();
    Json(serde_json::json!({ "protocols": protocols }))
}

/// Rolling protocol and country breakdown.
pub async fn rolling(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.rolling_breakdown().await)
}

/// Connection state and diagnostics.
pub async fn connection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.connection_status().await)
}

/// Latest upstream totals.
pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.dashboard.server_stats().await)
}

/// Cached events from the last `window_ms`, newest first.
pub async fn recent_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let window_ms = params.window_ms.unwrap_or(DEFAULT_RECENT_WINDOW_MS);
    if window_ms <= 0 {
        return Err(ObserverError::InvalidQuery(format!(
            "window_ms must be positive, got {window_ms}"
        )));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT);

    let mut events = state.dashboard.store().query_recent(window_ms).await?;
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);

    Ok(Json(serde_json::json!({
        "count": events.len(),
        "window_ms": window_ms,
        "events": events,
    })))
}

/// Drop every cached event.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let removed = state.dashboard.clear_cache().await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
