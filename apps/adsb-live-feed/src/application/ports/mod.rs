//! Port Interfaces
//!
//! Defines the interfaces (ports) between the live feed and its consumer
//! following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FeedListener`: Receives aircraft updates and lifecycle notifications
//!   from a `LiveFeed`
//!
//! Ready-made listeners cover the common consumers: an `AircraftSnapshot`,
//! a channel, or a plain closure.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::aircraft::Aircraft;
use crate::domain::connection::CloseInfo;
use crate::domain::snapshot::AircraftSnapshot;

/// Consumer of a live aircraft feed.
///
/// Callbacks run one at a time, in frame arrival order, on the feed's event
/// task. They should return quickly.
#[cfg_attr(test, mockall::automock)]
pub trait FeedListener: Send + 'static {
    /// A batch of aircraft arrived. The batch may be partial; merging into a
    /// snapshot is the listener's job.
    fn on_aircraft_update(&mut self, aircraft: Vec<Aircraft>);

    /// The channel opened.
    fn on_open(&mut self) {}

    /// The channel closed.
    fn on_close(&mut self, _close: &CloseInfo) {}

    /// The channel reported an error.
    fn on_error(&mut self, _error: &str) {}
}

impl FeedListener for Arc<AircraftSnapshot> {
    fn on_aircraft_update(&mut self, aircraft: Vec<Aircraft>) {
        let changes = self.apply(aircraft);
        tracing::trace!(
            inserted = changes.inserted.len(),
            updated = changes.updated.len(),
            "Snapshot updated"
        );
    }
}

impl FeedListener for mpsc::UnboundedSender<Vec<Aircraft>> {
    fn on_aircraft_update(&mut self, aircraft: Vec<Aircraft>) {
        if self.send(aircraft).is_err() {
            tracing::debug!("Aircraft update receiver dropped");
        }
    }
}

/// Listener backed by a closure.
pub struct FnListener<F>(F);

/// Wrap a closure as a `FeedListener`.
pub const fn listener_fn<F>(f: F) -> FnListener<F>
where
    F: FnMut(Vec<Aircraft>) + Send + 'static,
{
    FnListener(f)
}

impl<F> FeedListener for FnListener<F>
where
    F: FnMut(Vec<Aircraft>) + Send + 'static,
{
    fn on_aircraft_update(&mut self, aircraft: Vec<Aircraft>) {
        (self.0)(aircraft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_listener_merges_updates() {
        let snapshot = Arc::new(AircraftSnapshot::new());
        let mut listener = Arc::clone(&snapshot);

        listener.on_aircraft_update(vec![Aircraft::new("ABC123")]);
        listener.on_aircraft_update(vec![Aircraft::new("ABC123"), Aircraft::new("DEF456")]);

        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn channel_listener_forwards_batches() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut listener = tx;

        listener.on_aircraft_update(vec![Aircraft::new("ABC123")]);

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].icao_code, "ABC123");
    }

    #[test]
    fn channel_listener_tolerates_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut listener = tx;

        listener.on_aircraft_update(vec![Aircraft::new("ABC123")]);
    }

    #[test]
    fn closure_listener_is_invoked() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut listener = listener_fn(move |batch: Vec<Aircraft>| sink.lock().push(batch.len()));

        listener.on_aircraft_update(vec![Aircraft::new("A"), Aircraft::new("B")]);

        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn default_lifecycle_hooks_are_no_ops() {
        let mut listener = listener_fn(|_batch: Vec<Aircraft>| {});
        listener.on_open();
        listener.on_close(&CloseInfo::local());
        listener.on_error("boom");
    }
}
