//! Connection lifecycle state machine.
//!
//! Socket readiness is authoritative: a socket that is not open is never
//! reported as connected, however recent its last data. Only an open socket
//! is classified by data recency.
//!
//! ```text
//! Connecting --open--> Connected <--data-- Idle
//!     ^                    |  --stale-->    |
//!     |                    v                v
//!     +--begin_attempt-- Disconnected <-----+
//! ```
//!
//! Reconnects are guarded: a non-normal closure schedules exactly one
//! reconnect, and no second one can be scheduled or started until
//! [`ConnectionMonitor::begin_attempt`] consumes it.

use std::time::Duration;

use attackmap_types::{ConnectionState, ConnectionStatus, SocketReadiness};

/// Close code of a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code recorded when the socket dies without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Thresholds for the connection monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Data older than this marks an open socket as idle.
    pub idle_threshold_ms: i64,
    /// Data older than this is reported by the heartbeat.
    pub stale_log_threshold_ms: i64,
    /// Fixed delay before a reconnect attempt.
    pub reconnect_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 30_000,
            stale_log_threshold_ms: 60_000,
            reconnect_delay: Duration::from_secs(60),
        }
    }
}

/// Tracks socket readiness and data recency, and decides reconnects.
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    config: MonitorConfig,
    state: ConnectionState,
    readiness: SocketReadiness,
    last_data_ms: Option<i64>,
    reconnect_pending: bool,
    reconnect_attempts: u32,
    last_close_code: Option<u16>,
}

impl ConnectionMonitor {
    /// A monitor in the initial `Connecting` state.
    pub const fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Connecting,
            readiness: SocketReadiness::Connecting,
            last_data_ms: None,
            reconnect_pending: false,
            reconnect_attempts: 0,
            last_close_code: None,
        }
    }

    /// The active thresholds.
    pub const fn config(&self) -> MonitorConfig {
        self.config
    }

    /// Current classified state.
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current socket readiness.
    pub const fn readiness(&self) -> SocketReadiness {
        self.readiness
    }

    /// Whether a reconnect is scheduled and not yet started.
    pub const fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Reclassify from readiness and data recency at `now_ms`.
    pub fn evaluate(&mut self, now_ms: i64) -> ConnectionState {
        let next = match self.readiness {
            SocketReadiness::Connecting => ConnectionState::Connecting,
            SocketReadiness::Closing | SocketReadiness::Closed => ConnectionState::Disconnected,
            SocketReadiness::Open => match self.data_age(now_ms) {
                Some(age) if age < self.config.idle_threshold_ms => ConnectionState::Connected,
                _ => ConnectionState::Idle,
            },
        };
        self.transition(next);
        next
    }

    /// The socket finished its handshake. Opening counts as fresh data.
    pub fn on_open(&mut self, now_ms: i64) {
        self.readiness = SocketReadiness::Open;
        self.last_data_ms = Some(now_ms);
        self.evaluate(now_ms);
    }

    /// A valid message arrived.
    pub fn on_data(&mut self, now_ms: i64) {
        self.last_data_ms = Some(now_ms);
        self.evaluate(now_ms);
    }

    /// A close handshake started.
    pub fn on_closing(&mut self) {
        self.readiness = SocketReadiness::Closing;
        self.transition(ConnectionState::Disconnected);
    }

    /// The socket closed with `code`.
    ///
    /// Returns the delay after which to reconnect, or `None` for a normal
    /// closure or when a reconnect is already pending.
    pub fn on_close(&mut self, code: u16) -> Option<Duration> {
        self.readiness = SocketReadiness::Closed;
        self.last_close_code = Some(code);
        self.transition(ConnectionState::Disconnected);

        if code == NORMAL_CLOSURE {
            tracing::info!(code, "Upstream closed normally, not reconnecting");
            return None;
        }
        self.schedule_reconnect(code)
    }

    /// The transport failed. Treated as an abnormal closure.
    pub fn on_error(&mut self) -> Option<Duration> {
        self.readiness = SocketReadiness::Closed;
        self.last_close_code = Some(ABNORMAL_CLOSURE);
        self.transition(ConnectionState::Disconnected);
        self.schedule_reconnect(ABNORMAL_CLOSURE)
    }

    /// Start the scheduled reconnect.
    ///
    /// Returns `false` (and does nothing) unless a reconnect is pending, so
    /// two attempts can never run at once.
    pub fn begin_attempt(&mut self) -> bool {
        if !self.reconnect_pending {
            return false;
        }
        self.reconnect_pending = false;
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.readiness = SocketReadiness::Connecting;
        self.transition(ConnectionState::Connecting);
        tracing::info!(attempt = self.reconnect_attempts, "Reconnecting to upstream");
        true
    }

    /// Liveness check. Logs when data has been stale past the log
    /// threshold and returns whether it was. Never closes the socket.
    pub fn heartbeat(&self, now_ms: i64) -> bool {
        if self.readiness != SocketReadiness::Open {
            return false;
        }
        let Some(age) = self.data_age(now_ms) else {
            return false;
        };
        let stale = age > self.config.stale_log_threshold_ms;
        if stale {
            tracing::warn!(data_age_ms = age, "No upstream data received recently");
        }
        stale
    }

    /// Diagnostic snapshot.
    pub fn status(&self, now_ms: i64) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            readiness: self.readiness,
            last_data_ms: self.last_data_ms,
            data_age_ms: self.data_age(now_ms),
            reconnect_pending: self.reconnect_pending,
            reconnect_attempts: self.reconnect_attempts,
            last_close_code: self.last_close_code,
        }
    }

    fn schedule_reconnect(&mut self, code: u16) -> Option<Duration> {
        if self.reconnect_pending {
            tracing::debug!(code, "Reconnect already pending");
            return None;
        }
        self.reconnect_pending = true;
        tracing::warn!(
            code,
            delay_secs = self.config.reconnect_delay.as_secs(),
            "Upstream connection lost, reconnect scheduled"
        );
        Some(self.config.reconnect_delay)
    }

    fn data_age(&self, now_ms: i64) -> Option<i64> {
        self.last_data_ms.map(|t| now_ms.saturating_sub(t).max(0))
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::info!(from = ?self.state, to = ?next, "Connection state changed");
            self.state = next;
        }
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    const T0: i64 = 1_000_000;

    fn open_at(t: i64) -> ConnectionMonitor {
        let mut monitor = ConnectionMonitor::default();
        monitor.on_open(t);
        monitor
    }

    #[test]
    fn starts_connecting() {
        let mut monitor = ConnectionMonitor::default();
        assert_eq!(monitor.state(), ConnectionState::Connecting);
        assert_eq!(monitor.evaluate(T0), ConnectionState::Connecting);
    }

    #[test]
    fn open_socket_is_classified_by_data_age() {
        let mut monitor = open_at(T0);
        assert_eq!(monitor.state(), ConnectionState::Connected);

        monitor.on_data(T0);
        assert_eq!(monitor.evaluate(T0 + 5_000), ConnectionState::Connected);
        assert_eq!(monitor.evaluate(T0 + 40_000), ConnectionState::Idle);

        monitor.on_data(T0 + 41_000);
        assert_eq!(monitor.state(), ConnectionState::Connected);
    }

    #[test]
    fn idle_threshold_is_inclusive() {
        let mut monitor = open_at(T0);
        assert_eq!(monitor.evaluate(T0 + 29_999), ConnectionState::Connected);
        assert_eq!(monitor.evaluate(T0 + 30_000), ConnectionState::Idle);
    }

    #[test]
    fn closed_socket_is_disconnected_regardless_of_data() {
        let mut monitor = open_at(T0);
        monitor.on_data(T0);
        monitor.on_close(1001);
        assert_eq!(monitor.evaluate(T0 + 1), ConnectionState::Disconnected);

        let mut closing = open_at(T0);
        closing.on_closing();
        assert_eq!(closing.evaluate(T0), ConnectionState::Disconnected);
    }

    #[test]
    fn abnormal_close_schedules_exactly_one_reconnect() {
        let mut monitor = open_at(T0);
        assert_eq!(monitor.on_close(1006), Some(Duration::from_secs(60)));
        assert_eq!(monitor.on_close(1006), None);
        assert_eq!(monitor.on_error(), None);
        assert!(monitor.reconnect_pending());

        assert!(monitor.begin_attempt());
        assert!(!monitor.begin_attempt());
        assert_eq!(monitor.state(), ConnectionState::Connecting);
        assert_eq!(monitor.status(T0).reconnect_attempts, 1);
    }

    #[test]
    fn normal_close_never_reconnects() {
        let mut monitor = open_at(T0);
        assert_eq!(monitor.on_close(NORMAL_CLOSURE), None);
        assert!(!monitor.reconnect_pending());
        assert!(!monitor.begin_attempt());
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn error_then_close_is_one_closure() {
        let mut monitor = open_at(T0);
        assert!(monitor.on_error().is_some());
        assert!(monitor.on_close(1006).is_none());
        assert!(monitor.begin_attempt());

        monitor.on_open(T0 + 60_000);
        assert_eq!(monitor.state(), ConnectionState::Connected);
        assert!(monitor.on_close(1011).is_some());
    }

    #[test]
    fn heartbeat_only_reports() {
        let mut monitor = open_at(T0);
        assert!(!monitor.heartbeat(T0 + 60_000));
        assert!(monitor.heartbeat(T0 + 60_001));
        assert_eq!(monitor.readiness(), SocketReadiness::Open);
        assert_eq!(monitor.evaluate(T0 + 60_001), ConnectionState::Idle);
    }

    #[test]
    fn status_reports_age_and_close_code() {
        let mut monitor = open_at(T0);
        monitor.on_close(4000);
        let status = monitor.status(T0 + 2_500);
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.readiness, SocketReadiness::Closed);
        assert_eq!(status.data_age_ms, Some(2_500));
        assert_eq!(status.last_close_code, Some(4000));
        assert!(status.reconnect_pending);
    }
}
