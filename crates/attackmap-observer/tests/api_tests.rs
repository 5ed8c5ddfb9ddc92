//! Integration tests for the snapshot API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The dashboard behind the router caches to a JSON
//! document in a temp directory and runs on a manual clock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::sync::Arc;

use attackmap_core::{Dashboard, DashboardConfig};
use attackmap_observer::router::build_router;
use attackmap_observer::{ServerConfig, spawn_observer};
use attackmap_observer::state::AppState;
use attackmap_types::{Event, ManualClock, ServerStats};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

/// 2024-01-01T12:00:00Z.
const NOW: i64 = 1_704_110_400_000;

async fn make_test_state(dir: &tempfile::TempDir) -> Arc<AppState> {
    let mut config = DashboardConfig::default();
    config.store.sqlite_url = None;
    config.store.document_path = dir.path().join("events.json");

    let clock = Arc::new(ManualClock::new(NOW));
    let dashboard = Arc::new(Dashboard::open(&config, clock).await.unwrap());

    let hits = [
        ("1.1.1.1", "SSH", "France", "FR", NOW - 5_000),
        ("1.1.1.1", "ssh", "France", "FR", NOW - 4_000),
        ("2.2.2.2", "HTTP", "China", "CN", NOW - 3_000),
        ("3.3.3.3", "2222", "", "", NOW - 120_000),
    ];
    for (ip, protocol, country, code, ts) in hits {
        let event = Event::new(ip, "Cowrie", protocol, ts).with_country(country, code);
        dashboard.ingest_live(event).await;
    }

    Arc::new(AppState::new(dashboard))
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let app = build_router(Arc::clone(state));
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    send(
        state,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

#[tokio::test]
async fn health_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn summary_reports_totals_and_backend() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_ingested"], 4);
    assert_eq!(json["cached_events"], 4);
    assert_eq!(json["backend"], "document");
    assert_eq!(json["restoring"], false);
    assert_eq!(json["granularity"], "minute");
}

#[tokio::test]
async fn top_ips_respects_limit() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/top/ips?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ip"], "1.1.1.1");
    assert_eq!(rows[0]["hits"], 2);
    assert_eq!(rows[0]["last_protocol"], "SSH");
}

#[tokio::test]
async fn top_countries_tracks_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/top/countries").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["country"].as_str())
        .collect();
    assert_eq!(names, ["France", "China", "Unknown"]);
}

#[tokio::test]
async fn protocols_are_sorted_with_colors() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/protocols").await;
    assert_eq!(status, StatusCode::OK);
    let rows = json["protocols"].as_array().unwrap();
    assert_eq!(rows[0]["protocol"], "SSH");
    assert_eq!(rows[0]["count"], 2);
    assert_eq!(rows[0]["color"], "#FF9800");
    assert!(
        rows.iter()
            .any(|row| row["protocol"] == "OTHER" && row["color"] == "#78909C")
    );
}

#[tokio::test]
async fn heatmap_has_24_hours() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/heatmap").await;
    assert_eq!(status, StatusCode::OK);
    let cells = json.as_array().unwrap();
    assert_eq!(cells.len(), 24);
    // Three hits land at 11:59 UTC, one at 11:58.
    assert_eq!(cells[11]["attacks"], 4);
    assert_eq!(cells[11]["intensity"], 100.0);
}

#[tokio::test]
async fn granularity_switch_rebuilds_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let request = Request::builder()
        .method("PUT")
        .uri("/api/timeline/granularity")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"granularity":"hour"}"#))
        .unwrap();
    let (status, json) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["granularity"], "hour");
    assert_eq!(json["buckets"].as_array().unwrap().len(), 24);

    let (_, timeline) = get(&state, "/api/timeline").await;
    assert_eq!(timeline["granularity"], "hour");
}

#[tokio::test]
async fn invalid_granularity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let request = Request::builder()
        .method("PUT")
        .uri("/api/timeline/granularity")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"granularity":"fortnight"}"#))
        .unwrap();
    let (status, json) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].as_str().unwrap().contains("fortnight"));
}

#[tokio::test]
async fn recent_events_are_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/events/recent?window_ms=10000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 3);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events[0]["source_ip"], "2.2.2.2");
    assert_eq!(events[2]["timestamp"], NOW - 5_000);

    let (_, limited) = get(&state, "/api/events/recent?window_ms=600000&limit=2").await;
    assert_eq!(limited["count"], 2);
}

#[tokio::test]
async fn recent_events_rejects_non_positive_window() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, _) = get(&state, "/api/events/recent?window_ms=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clear_cache_empties_store() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;
    let mut rx = state.subscribe();

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/cache")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 4);
    assert!(rx.try_recv().is_ok());

    let (_, summary) = get(&state, "/api/summary").await;
    assert_eq!(summary["cached_events"], 0);
    // Aggregates are untouched by a cache clear.
    assert_eq!(summary["total_ingested"], 4);
}

#[tokio::test]
async fn connection_and_stats_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, json) = get(&state, "/api/connection").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reconnect_pending"], false);
    assert!(json["state"].is_string());

    state
        .dashboard
        .record_server_stats(ServerStats {
            last_1m: Some(7),
            last_1h: None,
            last_24h: Some(900),
        })
        .await;
    let (status, stats) = get(&state, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["last_1m"], 7);
    assert_eq!(stats["last_1h"], Value::Null);
    assert_eq!(stats["last_24h"], 900);
}

#[tokio::test]
async fn rolling_counts_recent_window() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;
    state.dashboard.refresh().await;

    let (status, json) = get(&state, "/api/rolling").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 4);
    assert_eq!(json["protocols"]["SSH"], 2);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;

    let (status, _) = get(&state, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn spawned_server_streams_updates_over_websocket() {
    use futures::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    let dir = tempfile::tempdir().unwrap();
    let state = make_test_state(&dir).await;
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let (handle, addr) = spawn_observer(&config, Arc::clone(&state)).await.unwrap();
    assert_ne!(addr.port(), 0);

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/updates"))
        .await
        .unwrap();

    // The server subscribes after the handshake, so keep publishing until
    // a frame arrives.
    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            state
                .dashboard
                .record_server_stats(ServerStats {
                    last_1m: Some(1),
                    last_1h: None,
                    last_24h: None,
                })
                .await;
            let next =
                tokio::time::timeout(std::time::Duration::from_millis(50), socket.next()).await;
            if let Ok(Some(Ok(Message::Text(text)))) = next {
                return text.to_string();
            }
        }
    })
    .await
    .unwrap();

    let update: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(update["kind"], "stats");
    assert_eq!(update["stats"]["last_1m"], 1);

    handle.abort();
}
