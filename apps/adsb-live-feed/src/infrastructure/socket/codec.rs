//! Frame Codec
//!
//! Encoding of outbound frames and decoding of inbound frames.
//!
//! - **Outbound**: text passes through untouched, structured values are
//!   JSON-encoded.
//! - **Inbound**: frames are decoded as JSON. A frame that is not valid
//!   JSON is forwarded as-is instead of being dropped.

use serde::Serialize;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A message waiting to be written to the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Already textual, sent verbatim.
    Text(String),
    /// Structured value, JSON-encoded on send.
    Structured(serde_json::Value),
}

impl OutboundFrame {
    /// Build a structured frame from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, CodecError> {
        Ok(Self::Structured(serde_json::to_value(value)?))
    }
}

impl From<String> for OutboundFrame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for OutboundFrame {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<serde_json::Value> for OutboundFrame {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// The frame was valid JSON.
    Structured(serde_json::Value),
    /// A text frame that was not valid JSON, unmodified.
    Raw(String),
    /// A binary frame that was not valid JSON, unmodified.
    Binary(Vec<u8>),
}

impl InboundPayload {
    /// The decoded JSON value, if any.
    #[must_use]
    pub const fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Raw(_) | Self::Binary(_) => None,
        }
    }

    /// Label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Raw(_) => "raw",
            Self::Binary(_) => "binary",
        }
    }
}

/// JSON frame codec for the live channel.
#[derive(Debug, Default, Clone)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encode a frame as wire text.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, frame: &OutboundFrame) -> Result<String, CodecError> {
        match frame {
            OutboundFrame::Text(text) => Ok(text.clone()),
            OutboundFrame::Structured(value) => Ok(serde_json::to_string(value)?),
        }
    }

    /// Decode a text frame. Never fails: invalid JSON comes back as `Raw`.
    #[must_use]
    pub fn decode_text(&self, text: &str) -> InboundPayload {
        match serde_json::from_str(text) {
            Ok(value) => InboundPayload::Structured(value),
            Err(e) => {
                tracing::debug!(error = %e, len = text.len(), "Inbound frame is not JSON, forwarding raw");
                InboundPayload::Raw(text.to_owned())
            }
        }
    }

    /// Decode a binary frame. Never fails: invalid JSON comes back as `Binary`.
    #[must_use]
    pub fn decode_binary(&self, data: &[u8]) -> InboundPayload {
        match serde_json::from_slice(data) {
            Ok(value) => InboundPayload::Structured(value),
            Err(e) => {
                tracing::debug!(error = %e, len = data.len(), "Inbound binary frame is not JSON, forwarding raw");
                InboundPayload::Binary(data.to_vec())
            }
        }
    }
}
