//! Aircraft Entity
//!
//! The tracked entity delivered by the live feed. Every field except the
//! station code may be unknown, so everything else is optional.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "icao_code": "A1B2C3",
//!   "latitude": 51.47, "longitude": -0.45, "altitude": 3200,
//!   "ground_speed": 180.5, "heading": 270, "vertical_rate": -640,
//!   "callsign": "BAW123", "registration": "G-EUPT", "model": "A319",
//!   "updated_at": "2024-03-15T10:00:00"
//! }
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A station code (ICAO 24-bit address in hex).
pub type IcaoCode = String;

/// Normalize a station code for use as a lookup key.
///
/// Station codes are hex, so comparison is case-insensitive.
#[must_use]
pub fn normalize_icao(code: &str) -> IcaoCode {
    code.trim().to_ascii_uppercase()
}

/// Last known state of one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Station code identifying the aircraft.
    pub icao_code: IcaoCode,

    /// Latitude in decimal degrees.
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees.
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Altitude in feet.
    #[serde(default)]
    pub altitude: Option<f64>,

    /// Ground speed in knots.
    #[serde(default)]
    pub ground_speed: Option<f64>,

    /// Heading in degrees.
    #[serde(default)]
    pub heading: Option<f64>,

    /// Vertical rate in feet per minute.
    #[serde(default)]
    pub vertical_rate: Option<f64>,

    /// Flight callsign.
    #[serde(default)]
    pub callsign: Option<String>,

    /// Registration (tail number).
    #[serde(default)]
    pub registration: Option<String>,

    /// Aircraft model.
    #[serde(default)]
    pub model: Option<String>,

    /// Whether the aircraft reports being on the ground.
    #[serde(default)]
    pub on_ground: Option<bool>,

    /// Transponder squawk code.
    #[serde(default)]
    pub squawk: Option<String>,

    /// Server-side update timestamp as sent on the wire.
    #[serde(default)]
    pub updated_at: Option<String>,

    /// Fields this client does not model, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Aircraft {
    /// Create an aircraft with only its station code known.
    #[must_use]
    pub fn new(icao_code: impl Into<IcaoCode>) -> Self {
        Self {
            icao_code: icao_code.into(),
            latitude: None,
            longitude: None,
            altitude: None,
            ground_speed: None,
            heading: None,
            vertical_rate: None,
            callsign: None,
            registration: None,
            model: None,
            on_ground: None,
            squawk: None,
            updated_at: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the position.
    #[must_use]
    pub fn with_position(mut self, latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self.altitude = altitude;
        self
    }

    /// Set the callsign.
    #[must_use]
    pub fn with_callsign(mut self, callsign: impl Into<String>) -> Self {
        self.callsign = Some(callsign.into());
        self
    }

    /// Normalized station code of this aircraft.
    #[must_use]
    pub fn key(&self) -> IcaoCode {
        normalize_icao(&self.icao_code)
    }

    /// Both latitude and longitude are known.
    #[must_use]
    pub const fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Parse `updated_at`.
    ///
    /// Accepts RFC 3339 and offset-less ISO-8601 (interpreted as UTC).
    #[must_use]
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.updated_at.as_deref()?.trim();

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn deserialize_full_entity() {
        let json = r#"{
            "icao_code": "a1b2c3",
            "latitude": 51.47,
            "longitude": -0.45,
            "altitude": 3200,
            "ground_speed": 180.5,
            "heading": 270,
            "vertical_rate": -640,
            "callsign": "BAW123",
            "registration": "G-EUPT",
            "model": "A319",
            "updated_at": "2024-03-15T10:00:00"
        }"#;

        let aircraft: Aircraft = serde_json::from_str(json).unwrap();
        assert_eq!(aircraft.icao_code, "a1b2c3");
        assert_eq!(aircraft.key(), "A1B2C3");
        assert!(aircraft.has_position());
        assert_eq!(aircraft.callsign.as_deref(), Some("BAW123"));
        assert!(aircraft.extra.is_empty());
    }

    #[test]
    fn nullable_fields_may_be_absent_or_null() {
        let json = r#"{"icao_code":"ABC123","latitude":null,"callsign":null}"#;

        let aircraft: Aircraft = serde_json::from_str(json).unwrap();
        assert_eq!(aircraft, Aircraft::new("ABC123"));
        assert!(!aircraft.has_position());
    }

    #[test]
    fn missing_icao_code_is_rejected() {
        let json = r#"{"latitude":1.0,"longitude":2.0}"#;
        assert!(serde_json::from_str::<Aircraft>(json).is_err());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{"icao_code":"ABC123","rssi":-12.5,"nav_modes":["autopilot"]}"#;

        let aircraft: Aircraft = serde_json::from_str(json).unwrap();
        assert_eq!(aircraft.extra.len(), 2);

        let value = serde_json::to_value(&aircraft).unwrap();
        assert_eq!(value["rssi"], serde_json::json!(-12.5));
        assert_eq!(value["nav_modes"][0], "autopilot");
    }

    #[test]
    fn updated_at_naive_iso_is_utc() {
        let mut aircraft = Aircraft::new("ABC123");
        aircraft.updated_at = Some("2024-03-15T10:20:30.500".to_string());

        let ts = aircraft.updated_at_utc().unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.second(), 30);
    }

    #[test]
    fn updated_at_rfc3339_offset_is_converted() {
        let mut aircraft = Aircraft::new("ABC123");
        aircraft.updated_at = Some("2024-03-15T12:00:00+02:00".to_string());

        assert_eq!(aircraft.updated_at_utc().unwrap().hour(), 10);
    }

    #[test]
    fn updated_at_garbage_is_none() {
        let mut aircraft = Aircraft::new("ABC123");
        aircraft.updated_at = Some("yesterday".to_string());
        assert!(aircraft.updated_at_utc().is_none());
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_icao("  a1b2c3 "), "A1B2C3");
    }
}
