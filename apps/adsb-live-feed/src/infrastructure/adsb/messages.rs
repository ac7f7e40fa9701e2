//! ADS-B Feed Message Types
//!
//! Wire format types for the live aircraft channel.
//!
//! # Inbound
//!
//! ```json
//! {"type": "aircraft_update", "payload": {...} }
//! {"type": "aircraft_update", "payload": [{...}, {...}] }
//! {"type": "connection_status", "status": "connected"}
//! ```
//!
//! Any other `type` is unknown and ignored. Entities in an update decode one
//! at a time; an entity that does not decode is skipped and the rest of the
//! batch is kept in order.
//!
//! # Outbound
//!
//! ```json
//! {"type": "subscribe", "icao_codes": ["ABC123"]}
//! {"type": "unsubscribe", "icao_codes": ["ABC123"]}
//! {"type": "request_snapshot"}
//! {"type": "start_tracking_all"}
//! {"type": "stop_tracking_all"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::aircraft::{Aircraft, IcaoCode};
use crate::infrastructure::metrics;
use crate::infrastructure::socket::InboundPayload;

// =============================================================================
// Outbound Commands
// =============================================================================

/// Control command sent to the feed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedCommand {
    /// Start receiving updates for these aircraft.
    Subscribe {
        /// Station codes.
        icao_codes: Vec<IcaoCode>,
    },
    /// Stop receiving updates for these aircraft.
    Unsubscribe {
        /// Station codes.
        icao_codes: Vec<IcaoCode>,
    },
    /// Ask for the full current state.
    RequestSnapshot,
    /// Receive updates for every aircraft.
    StartTrackingAll,
    /// Stop the tracking started by `StartTrackingAll`.
    StopTrackingAll,
}

impl FeedCommand {
    /// Wire name, also used as a log and metric label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::RequestSnapshot => "request_snapshot",
            Self::StartTrackingAll => "start_tracking_all",
            Self::StopTrackingAll => "stop_tracking_all",
        }
    }
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// An `aircraft_update` payload: a lone entity or an array of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Array payload.
    Many(Vec<T>),
    /// Single entity payload.
    One(Box<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![*item],
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    AircraftUpdate {
        payload: OneOrMany<Value>,
    },
    ConnectionStatus {
        #[serde(default)]
        status: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

/// Interpretation of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A batch of aircraft, in wire order.
    AircraftUpdate(Vec<Aircraft>),
    /// Server status notice.
    ConnectionStatus(Option<String>),
    /// A known tag whose body could not be decoded.
    Malformed {
        /// The frame's `type`.
        tag: String,
        /// Decode error.
        error: String,
    },
    /// Unrecognised or missing tag, or a frame that was not JSON.
    Unknown(Option<String>),
}

impl FeedMessage {
    /// Interpret a decoded inbound frame.
    #[must_use]
    pub fn interpret(payload: &InboundPayload) -> Self {
        match payload.as_structured() {
            Some(value) => Self::from_value(value),
            None => Self::Unknown(None),
        }
    }

    /// Interpret a JSON value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let tag = value.get("type").and_then(Value::as_str);

        match WireMessage::deserialize(value) {
            Ok(WireMessage::AircraftUpdate { payload }) => decode_batch(payload.into()),
            Ok(WireMessage::ConnectionStatus { status }) => {
                Self::ConnectionStatus(status.map(|status| match status {
                    Value::String(text) => text,
                    other => other.to_string(),
                }))
            }
            Ok(WireMessage::Unknown) => Self::Unknown(tag.map(str::to_owned)),
            Err(e) => match tag {
                Some(tag @ "aircraft_update") => Self::Malformed {
                    tag: tag.to_owned(),
                    error: e.to_string(),
                },
                _ => Self::Unknown(tag.map(str::to_owned)),
            },
        }
    }
}

/// Decode each entity on its own, keeping wire order.
///
/// Malformed only when there were entities and none of them decoded.
fn decode_batch(entities: Vec<Value>) -> FeedMessage {
    let total = entities.len();
    let mut batch = Vec::with_capacity(total);
    let mut first_error = None;

    for (index, entity) in entities.into_iter().enumerate() {
        match Aircraft::deserialize(entity) {
            Ok(aircraft) => batch.push(aircraft),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping undecodable aircraft entity");
                metrics::record_protocol_error("entity");
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    match first_error {
        Some(error) if batch.is_empty() && total > 0 => FeedMessage::Malformed {
            tag: "aircraft_update".to_owned(),
            error,
        },
        _ => FeedMessage::AircraftUpdate(batch),
    }
}
