//! Upstream attack-map feed over `WebSocket`.
//!
//! Text frames carry the data server's JSON messages (`Traffic` and
//! `Stats`). Every frame that decodes into something useful counts as
//! fresh data for the [`ConnectionMonitor`]; everything else is logged at
//! `debug` and dropped before it reaches the cache or the aggregates.
//!
//! Reconnect policy lives in the monitor. This task only reports what the
//! socket did and honours the delay it gets back.
//!
//! [`ConnectionMonitor`]: attackmap_core::ConnectionMonitor

use std::sync::Arc;
use std::time::Duration;

use attackmap_core::Dashboard;
use attackmap_core::connection::ABNORMAL_CLOSURE;
use attackmap_types::{Event, WireMessage};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a single text frame turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A traffic message was ingested as an event.
    Event,
    /// A stats message was merged into the server totals.
    Stats,
    /// The frame was malformed or not a usable event.
    Ignored,
}

/// Connect to `url` and feed the dashboard until the upstream closes
/// normally. Abnormal closures and connect failures wait out the
/// monitor's reconnect delay and try again.
pub async fn run(dashboard: Arc<Dashboard>, url: String) {
    loop {
        let delay = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!(url = %url, "Connected to upstream feed");
                dashboard.connection_opened().await;
                session(&dashboard, stream).await
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Upstream connect failed");
                dashboard.connection_error().await
            }
        };

        let Some(delay) = delay else {
            info!("Upstream transport finished");
            return;
        };

        debug!(delay_ms = delay.as_millis(), "Waiting before reconnect");
        tokio::time::sleep(delay).await;
        if !dashboard.begin_reconnect().await {
            debug!("No reconnect pending, retrying anyway");
        }
    }
}

/// Pump one connected socket. Returns the reconnect delay reported by the
/// monitor when the socket goes away.
async fn session(dashboard: &Dashboard, mut stream: UpstreamStream) -> Option<Duration> {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_text(dashboard, text.as_str()).await;
            }
            Ok(Message::Close(frame)) => {
                let code = frame.map_or(ABNORMAL_CLOSURE, |f| u16::from(f.code));
                info!(code, "Upstream sent close frame");
                return dashboard.connection_closed(code).await;
            }
            Ok(Message::Binary(bytes)) => {
                debug!(len = bytes.len(), "Ignoring binary frame");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Upstream socket error");
                return dashboard.connection_error().await;
            }
        }
    }
    debug!("Upstream stream ended without close frame");
    dashboard.connection_closed(ABNORMAL_CLOSURE).await
}

/// Decode one text frame and route it into the dashboard.
pub async fn handle_text(dashboard: &Dashboard, text: &str) -> FrameOutcome {
    let message = match WireMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "Dropping undecodable frame");
            return FrameOutcome::Ignored;
        }
    };

    match message {
        WireMessage::Traffic(traffic) => match Event::try_from(traffic) {
            Ok(event) => {
                dashboard.connection_data().await;
                dashboard.ingest_live(event).await;
                FrameOutcome::Event
            }
            Err(e) => {
                debug!(error = %e, "Dropping malformed traffic message");
                FrameOutcome::Ignored
            }
        },
        WireMessage::Stats(stats) => {
            dashboard.connection_data().await;
            dashboard.record_server_stats(stats).await;
            FrameOutcome::Stats
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use attackmap_core::DashboardConfig;
    use attackmap_types::{ConnectionState, ManualClock};

    /// 2024-01-01T12:00:00Z.
    const NOW: i64 = 1_704_110_400_000;

    async fn dashboard(dir: &tempfile::TempDir) -> Dashboard {
        let mut config = DashboardConfig::default();
        config.store.sqlite_url = None;
        config.store.document_path = dir.path().join("events.json");
        Dashboard::open(&config, Arc::new(ManualClock::new(NOW)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn traffic_frame_is_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(&dir).await;
        dashboard.connection_opened().await;

        let frame = r#"{
            "type": "Traffic",
            "src_ip": "203.0.113.9",
            "dst_ip": "198.51.100.1",
            "dst_port": 22,
            "protocol": "ssh",
            "honeypot": "Cowrie",
            "country": "France",
            "iso_code": "FR",
            "event_time": "2024-01-01 11:59:30"
        }"#;
        assert_eq!(handle_text(&dashboard, frame).await, FrameOutcome::Event);

        let top = dashboard.top_ips(10).await;
        assert_eq!(top.len(), 1);
        assert_eq!(top.first().unwrap().ip, "203.0.113.9");
        assert_eq!(dashboard.store().len().await.unwrap(), 1);
        assert_eq!(
            dashboard.connection_state().await,
            ConnectionState::Connected
        );
    }

    #[tokio::test]
    async fn stats_frame_updates_totals() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(&dir).await;

        let frame = r#"{"type": "Stats", "last_1m": 3, "last_24h": 1200}"#;
        assert_eq!(handle_text(&dashboard, frame).await, FrameOutcome::Stats);

        let stats = dashboard.server_stats().await;
        assert_eq!(stats.last_1m, Some(3));
        assert_eq!(stats.last_1h, None);
        assert_eq!(stats.last_24h, Some(1200));
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dashboard(&dir).await;

        let frames = [
            "not json",
            r#"{"type": "Unknown"}"#,
            r#"{"type": "Traffic", "honeypot": "Cowrie", "event_time": "2024-01-01 11:59:30"}"#,
            r#"{"type": "Traffic", "src_ip": "1.2.3.4", "honeypot": "Cowrie", "event_time": "yesterday"}"#,
        ];
        for frame in frames {
            assert_eq!(handle_text(&dashboard, frame).await, FrameOutcome::Ignored);
        }
        assert!(dashboard.store().is_empty().await.unwrap());
        assert_eq!(dashboard.summary().await.total_ingested, 0);
    }
}
