//! The normalised attack event.
//!
//! An [`Event`] is built once at the ingestion boundary (from a wire
//! message or a storage row), validated, and never mutated afterwards.
//! The only field the cache fills in later is `cached_at`, and it does so
//! by producing a new value with [`Event::with_cached_at`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EventId;
use crate::protocol::normalize_protocol;

/// Errors raised when an event fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A required identity field was missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The event time could not be parsed or was out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range coordinates.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }
}

/// A single honeypot hit, normalised and ready for caching and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Identity of the event.
    pub id: EventId,
    /// Attacker address.
    pub source_ip: String,
    /// Honeypot address that was hit.
    pub destination_ip: String,
    /// Attacker source port (0 when unknown).
    pub source_port: u16,
    /// Targeted port on the honeypot.
    pub destination_port: u16,
    /// Normalised service name (see [`normalize_protocol`]).
    pub protocol: String,
    /// Attacker country name.
    pub country: String,
    /// Attacker ISO country code.
    pub country_code: String,
    /// Honeypot type that recorded the hit (e.g. `Cowrie`).
    pub honeypot_id: String,
    /// Time of the hit, Unix epoch milliseconds.
    pub timestamp: i64,
    /// When the event entered the local cache, Unix epoch milliseconds.
    #[serde(default)]
    pub cached_at: Option<i64>,
    /// Attacker geolocation, when resolved upstream.
    #[serde(default)]
    pub source_location: Option<GeoPoint>,
    /// Honeypot geolocation, when resolved upstream.
    #[serde(default)]
    pub destination_location: Option<GeoPoint>,
    /// Upstream IP reputation label.
    #[serde(default)]
    pub reputation: Option<String>,
    /// Attacker continent code.
    #[serde(default)]
    pub continent_code: Option<String>,
    /// Hostname of the sensor running the honeypot.
    #[serde(default)]
    pub honeypot_hostname: Option<String>,
    /// Honeypot ISO country code.
    #[serde(default)]
    pub destination_country_code: Option<String>,
}

impl Event {
    /// Create an event with the identity fields set and everything else empty.
    ///
    /// The protocol is normalised here so every construction path agrees.
    pub fn new(source_ip: &str, honeypot_id: &str, protocol: &str, timestamp: i64) -> Self {
        Self {
            id: EventId::new(),
            source_ip: source_ip.trim().to_owned(),
            destination_ip: String::new(),
            source_port: 0,
            destination_port: 0,
            protocol: normalize_protocol(protocol),
            country: String::new(),
            country_code: String::new(),
            honeypot_id: honeypot_id.trim().to_owned(),
            timestamp,
            cached_at: None,
            source_location: None,
            destination_location: None,
            reputation: None,
            continent_code: None,
            honeypot_hostname: None,
            destination_country_code: None,
        }
    }

    /// Set the attacker country.
    #[must_use]
    pub fn with_country(mut self, country: &str, country_code: &str) -> Self {
        country.clone_into(&mut self.country);
        country_code.clone_into(&mut self.country_code);
        self
    }

    /// Set the attacker coordinates.
    #[must_use]
    pub const fn with_source_location(mut self, location: GeoPoint) -> Self {
        self.source_location = Some(location);
        self
    }

    /// Set source and destination ports.
    #[must_use]
    pub const fn with_ports(mut self, source_port: u16, destination_port: u16) -> Self {
        self.source_port = source_port;
        self.destination_port = destination_port;
        self
    }

    /// Set the honeypot address.
    #[must_use]
    pub fn with_destination_ip(mut self, destination_ip: &str) -> Self {
        destination_ip.clone_into(&mut self.destination_ip);
        self
    }

    /// Set the upstream reputation label.
    #[must_use]
    pub fn with_reputation(mut self, reputation: &str) -> Self {
        self.reputation = Some(reputation.to_owned());
        self
    }

    /// Return a copy stamped with `cached_at`, unless one is already set.
    #[must_use]
    pub fn with_cached_at(mut self, now_ms: i64) -> Self {
        if self.cached_at.is_none() {
            self.cached_at = Some(now_ms);
        }
        self
    }

    /// Check the identity fields every downstream consumer relies on.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingField`] for an empty source IP or
    /// honeypot id, and [`EventError::InvalidTimestamp`] for a
    /// non-positive timestamp.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.source_ip.is_empty() {
            return Err(EventError::MissingField("source_ip"));
        }
        if self.honeypot_id.is_empty() {
            return Err(EventError::MissingField("honeypot_id"));
        }
        if self.timestamp <= 0 {
            return Err(EventError::InvalidTimestamp(self.timestamp.to_string()));
        }
        Ok(())
    }

    /// Key used to deduplicate map markers: coordinates when known,
    /// otherwise the source IP.
    pub fn location_key(&self) -> String {
        self.source_location.map_or_else(
            || format!("ip:{}", self.source_ip),
            |p| format!("geo:{:.4},{:.4}", p.lat, p.lng),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_protocol_and_trims() {
        let event = Event::new(" 1.2.3.4 ", "Cowrie", "ssh", 10);
        assert_eq!(event.source_ip, "1.2.3.4");
        assert_eq!(event.protocol, "SSH");
        assert!(event.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_identity() {
        let event = Event::new("", "Cowrie", "SSH", 10);
        assert_eq!(event.validate(), Err(EventError::MissingField("source_ip")));

        let event = Event::new("1.2.3.4", "", "SSH", 10);
        assert_eq!(
            event.validate(),
            Err(EventError::MissingField("honeypot_id"))
        );

        let event = Event::new("1.2.3.4", "Cowrie", "SSH", 0);
        assert!(matches!(
            event.validate(),
            Err(EventError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn cached_at_is_only_assigned_once() {
        let event = Event::new("1.2.3.4", "Cowrie", "SSH", 10).with_cached_at(100);
        let again = event.with_cached_at(200);
        assert_eq!(again.cached_at, Some(100));
    }

    #[test]
    fn location_key_prefers_coordinates() {
        let plain = Event::new("1.2.3.4", "Cowrie", "SSH", 10);
        assert_eq!(plain.location_key(), "ip:1.2.3.4");

        let point = GeoPoint::new(48.8566, 2.3522).unwrap_or(GeoPoint { lat: 0.0, lng: 0.0 });
        let located = plain.with_source_location(point);
        assert_eq!(located.location_key(), "geo:48.8566,2.3522");
    }

    #[test]
    fn geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, f64::NAN).is_none());
        assert!(GeoPoint::new(-33.9, 151.2).is_some());
    }
}
