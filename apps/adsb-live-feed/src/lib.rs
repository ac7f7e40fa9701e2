#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::cast_possible_truncation,
        clippy::items_after_statements
    )
)]

//! ADS-B Live Feed - Real-time Aircraft Feed Client
//!
//! Keeps one reconnectable WebSocket connection to an ADS-B feed server,
//! interprets its aircraft update protocol and hands batches of aircraft to
//! a consumer, typically an `AircraftSnapshot`.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `aircraft`: The tracked entity
//!   - `connection`: Connection state machine and close details
//!   - `snapshot`: Consumer-side map of station code to last known state
//!
//! - **Application**: Port definitions
//!   - `ports`: `FeedListener`, the consumer callback surface
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `socket`: WebSocket transport, framing, queueing, backoff
//!   - `adsb`: Live feed adapter and wire messages
//!   - `config`: Environment-driven configuration
//!   - `metrics`: Prometheus metrics
//!   - `telemetry`: Tracing subscriber and OTLP export
//!
//! # Data Flow
//!
//! ```text
//!                  ┌─────────────────┐ TransportEvent ┌──────────┐
//! Feed server WS ◄─┤ SocketTransport ├───────────────►│ LiveFeed ├──► FeedListener
//!                  └────────▲────────┘                └────┬─────┘
//!                           └───── FeedCommand (JSON) ─────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Aircraft and connection types with no external I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::aircraft::{Aircraft, IcaoCode, normalize_icao};
pub use domain::connection::{CloseInfo, ConnectionState};
pub use domain::snapshot::{AircraftSnapshot, SnapshotChanges, TrackedAircraft};

// Ports
pub use application::ports::{FeedListener, FnListener, listener_fn};

// Socket transport
pub use infrastructure::socket::{
    InboundPayload, OutboundFrame, ReconnectConfig, ReconnectPolicy, SocketTransport,
    TransportConfig, TransportError, TransportEvent,
};

// Live feed
pub use infrastructure::adsb::{ControlOutcome, FeedCommand, FeedMessage, LiveFeed, LiveFeedConfig};

// Infrastructure config
pub use infrastructure::config::{
    AutoReconnectSettings, ConfigError, FeedConfig, TrackingSettings, TransportSettings,
};

// Metrics
pub use infrastructure::metrics::{MetricsError, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
