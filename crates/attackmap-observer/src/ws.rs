//! Live dashboard feed at `GET /ws/updates`.
//!
//! Each text frame is one JSON [`DashboardUpdate`], tagged by `kind`:
//!
//! - `event`: a newly ingested hit, with the `highlight` and `sound` cues
//!   the front end should play (both off while a restore is running);
//! - `marker_restored`: a cached hit to redraw on the map after startup;
//! - `restored`: the replay finished, carrying the replayed count;
//! - `connection`: the upstream link changed state;
//! - `stats`: merged upstream hit totals;
//! - `cache_cleared`: the local cache was emptied.
//!
//! A client that falls more than the channel capacity behind misses the
//! overflow and continues with the newest update; it should re-read the
//! REST snapshots to resynchronise.

use std::sync::Arc;

use attackmap_types::DashboardUpdate;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade to a `WebSocket` and start forwarding dashboard updates.
pub async fn ws_updates(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_updates(socket, state))
}

async fn stream_updates(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.subscribe();
    debug!("Dashboard feed subscriber attached");

    loop {
        let keep_going = tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => forward(&mut socket, &update).await,
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Dashboard feed subscriber fell behind");
                    true
                }
                Err(RecvError::Closed) => false,
            },
            incoming = socket.recv() => client_frame(&mut socket, incoming).await,
        };
        if !keep_going {
            break;
        }
    }

    debug!("Dashboard feed subscriber detached");
}

/// Send one update; `false` once the client is gone.
async fn forward(socket: &mut WebSocket, update: &DashboardUpdate) -> bool {
    match serde_json::to_string(update) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Could not encode dashboard update");
            true
        }
    }
}

/// React to a frame from the client. The feed is one-way, so only pings
/// and closes matter.
async fn client_frame(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, axum::Error>>,
) -> bool {
    match incoming {
        Some(Ok(Message::Ping(payload))) => socket.send(Message::Pong(payload)).await.is_ok(),
        Some(Ok(Message::Close(_))) | None => false,
        Some(Err(e)) => {
            debug!(error = %e, "Dashboard feed socket error");
            false
        }
        Some(Ok(_)) => true,
    }
}
