//! Wire format of the upstream attack-map `WebSocket` feed.
//!
//! The server publishes JSON text frames tagged by `type`: `Traffic`
//! frames carry one honeypot hit, `Stats` frames carry hit totals.
//! Numeric fields arrive as numbers or strings depending on the upstream
//! index mapping, so they are accepted as raw JSON values and coerced here.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{Event, EventError, GeoPoint};
use crate::ids::EventId;
use crate::protocol::{OTHER, normalize_protocol, port_to_protocol};
use crate::snapshot::ServerStats;

/// Time format used by the data server for `event_time` (UTC).
const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A decoded frame from the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// One honeypot hit.
    Traffic(TrafficMessage),
    /// Periodic hit totals.
    Stats(ServerStats),
}

impl WireMessage {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] when the frame is not a known message.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A `Traffic` frame exactly as the data server emits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficMessage {
    /// Service name assigned upstream.
    pub protocol: Option<String>,
    /// Display colour assigned upstream.
    pub color: Option<String>,
    /// Attacker ISO country code.
    pub iso_code: Option<String>,
    /// Honeypot type.
    pub honeypot: Option<String>,
    /// Attacker source port.
    pub src_port: Option<Value>,
    /// Event time, `YYYY-MM-DD HH:MM:SS` in UTC.
    pub event_time: Option<String>,
    /// Attacker latitude.
    pub src_lat: Option<Value>,
    /// Attacker longitude.
    pub src_long: Option<Value>,
    /// Attacker address.
    pub src_ip: Option<String>,
    /// Reputation label.
    pub ip_rep: Option<String>,
    /// Honeypot longitude.
    pub dst_long: Option<Value>,
    /// Honeypot latitude.
    pub dst_lat: Option<Value>,
    /// Attacker continent code.
    pub continent_code: Option<String>,
    /// Server-side running counter.
    pub event_count: Option<u64>,
    /// Attacker country name.
    pub country: Option<String>,
    /// Targeted port.
    pub dst_port: Option<Value>,
    /// Honeypot address.
    pub dst_ip: Option<String>,
    /// Honeypot ISO country code.
    pub dst_iso_code: Option<String>,
    /// Honeypot country name.
    pub dst_country_name: Option<String>,
    /// Sensor hostname.
    pub honeypot_hostname: Option<String>,
}

impl TryFrom<TrafficMessage> for Event {
    type Error = EventError;

    fn try_from(msg: TrafficMessage) -> Result<Self, Self::Error> {
        let source_ip = non_empty(msg.src_ip).ok_or(EventError::MissingField("src_ip"))?;
        let honeypot = non_empty(msg.honeypot).ok_or(EventError::MissingField("honeypot"))?;
        let raw_time = non_empty(msg.event_time).ok_or(EventError::MissingField("event_time"))?;
        let timestamp = parse_event_time(&raw_time)?;

        let destination_port = as_port(msg.dst_port.as_ref());
        let protocol = msg
            .protocol
            .as_deref()
            .map(normalize_protocol)
            .filter(|p| p != OTHER)
            .unwrap_or_else(|| port_to_protocol(destination_port).to_owned());

        let event = Self {
            id: EventId::new(),
            source_ip,
            destination_ip: msg.dst_ip.unwrap_or_default(),
            source_port: as_port(msg.src_port.as_ref()),
            destination_port,
            protocol,
            country: msg.country.unwrap_or_default(),
            country_code: msg.iso_code.unwrap_or_default(),
            honeypot_id: honeypot,
            timestamp,
            cached_at: None,
            source_location: as_point(msg.src_lat.as_ref(), msg.src_long.as_ref()),
            destination_location: as_point(msg.dst_lat.as_ref(), msg.dst_long.as_ref()),
            reputation: non_empty(msg.ip_rep),
            continent_code: non_empty(msg.continent_code),
            honeypot_hostname: non_empty(msg.honeypot_hostname),
            destination_country_code: non_empty(msg.dst_iso_code),
        };
        event.validate()?;
        Ok(event)
    }
}

/// Parse the data server's `event_time`, accepting RFC 3339 as well.
///
/// # Errors
///
/// Returns [`EventError::InvalidTimestamp`] when neither format matches.
pub fn parse_event_time(raw: &str) -> Result<i64, EventError> {
    let trimmed = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, EVENT_TIME_FORMAT) {
        return Ok(naive.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| EventError::InvalidTimestamp(format!("{trimmed}: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_port(value: Option<&Value>) -> u16 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .unwrap_or(0)
}

fn as_point(lat: Option<&Value>, lng: Option<&Value>) -> Option<GeoPoint> {
    GeoPoint::new(as_f64(lat)?, as_f64(lng)?)
}
