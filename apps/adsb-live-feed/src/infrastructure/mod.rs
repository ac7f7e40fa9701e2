//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete WebSocket plumbing and the ambient services around it.

/// WebSocket transport with queueing and reconnect support.
pub mod socket;

/// ADS-B live feed adapter on top of the socket transport.
pub mod adsb;

/// Configuration loaded from the environment.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
