//! Prometheus Metrics Module
//!
//! Exposes feed metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Frames received, sent and queued on the live channel
//! - **Connection**: Connected gauge, reconnects and transport errors
//! - **Protocol**: Dropped control commands and unusable feed messages
//! - **Aircraft**: Tracked aircraft and update batch sizes
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests need no setup.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Error type for metrics setup.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to install the exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Start a Prometheus exporter serving `/metrics` on `port`.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed (e.g. port already
/// in use, or a recorder is already installed).
pub fn init_metrics(port: u16) -> Result<SocketAddr, MetricsError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    register_metrics();
    tracing::info!(addr = %addr, "Prometheus metrics exporter started");

    Ok(addr)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Frames
    describe_counter!(
        "adsb_feed_frames_received_total",
        "Frames received on the live channel by payload kind"
    );
    describe_counter!(
        "adsb_feed_frames_sent_total",
        "Frames written to the live channel"
    );
    describe_counter!(
        "adsb_feed_frames_queued_total",
        "Frames queued while the channel was not connected"
    );
    describe_counter!(
        "adsb_feed_queue_flushes_total",
        "Outbound queue flushes on connect"
    );
    describe_histogram!(
        "adsb_feed_queue_flush_size",
        "Frames sent per outbound queue flush"
    );

    // Connection
    describe_gauge!(
        "adsb_feed_connected",
        "Whether the live channel is connected (1) or not (0)"
    );
    describe_counter!(
        "adsb_feed_reconnects_total",
        "Scheduled reconnects"
    );
    describe_counter!(
        "adsb_feed_transport_errors_total",
        "Live channel errors by kind"
    );

    // Protocol
    describe_counter!(
        "adsb_feed_control_dropped_total",
        "Control commands dropped while disconnected"
    );
    describe_counter!(
        "adsb_feed_protocol_errors_total",
        "Feed messages that could not be used, by kind"
    );

    // Aircraft
    describe_gauge!(
        "adsb_feed_tracked_aircraft",
        "Aircraft currently held in the snapshot"
    );
    describe_histogram!(
        "adsb_feed_update_size",
        "Aircraft per update message"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an inbound frame.
pub fn record_frame_received(kind: &'static str) {
    counter!("adsb_feed_frames_received_total", "kind" => kind).increment(1);
}

/// Record a frame written to the channel.
pub fn record_frame_sent() {
    counter!("adsb_feed_frames_sent_total").increment(1);
}

/// Record a frame queued while disconnected.
pub fn record_frame_queued() {
    counter!("adsb_feed_frames_queued_total").increment(1);
}

/// Record an outbound queue flush.
#[allow(clippy::cast_precision_loss)]
pub fn record_queue_flushed(count: usize) {
    counter!("adsb_feed_queue_flushes_total").increment(1);
    histogram!("adsb_feed_queue_flush_size").record(count as f64);
}

/// Update the connected gauge.
pub fn set_connected(connected: bool) {
    gauge!("adsb_feed_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a scheduled reconnect.
pub fn record_reconnect() {
    counter!("adsb_feed_reconnects_total").increment(1);
}

/// Record a channel error.
pub fn record_transport_error(kind: &'static str) {
    counter!("adsb_feed_transport_errors_total", "kind" => kind).increment(1);
}

/// Record a control command dropped while disconnected.
pub fn record_control_dropped(command: &'static str) {
    counter!("adsb_feed_control_dropped_total", "command" => command).increment(1);
}

/// Record an unusable feed message.
pub fn record_protocol_error(kind: &'static str) {
    counter!("adsb_feed_protocol_errors_total", "kind" => kind).increment(1);
}

/// Update the tracked aircraft gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_aircraft(count: usize) {
    gauge!("adsb_feed_tracked_aircraft").set(count as f64);
}

/// Record the size of an update batch.
#[allow(clippy::cast_precision_loss)]
pub fn record_update_size(count: usize) {
    histogram!("adsb_feed_update_size").record(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_frame_received("structured");
        record_frame_sent();
        record_frame_queued();
        record_queue_flushed(3);
        set_connected(true);
        record_reconnect();
        record_transport_error("websocket");
        record_control_dropped("subscribe");
        record_protocol_error("unknown");
        set_tracked_aircraft(12);
        record_update_size(4);
    }

    #[test]
    fn error_display() {
        let error = MetricsError::Installation("address in use".to_string());
        assert_eq!(error.to_string(), "metrics installation error: address in use");
    }
}
