//! Live Feed Adapter
//!
//! Wraps one `SocketTransport`, interprets the aircraft feed protocol and
//! exposes the feed's control commands.
//!
//! # Lifecycle
//!
//! Mounting a feed spawns its transport and event task and connects right
//! away. Dropping the feed tears both down, including any reconnect still
//! waiting to fire.
//!
//! # Control Commands
//!
//! Commands are only sent while the transport is connected. A command issued
//! while disconnected is logged and dropped, not queued; the caller sees
//! `ControlOutcome::Dropped`. Frames passed to the transport directly still
//! queue as usual.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::messages::{FeedCommand, FeedMessage};
use crate::application::ports::FeedListener;
use crate::domain::aircraft::IcaoCode;
use crate::domain::connection::ConnectionState;
use crate::infrastructure::metrics;
use crate::infrastructure::socket::{
    InboundPayload, ReconnectConfig, ReconnectError, ReconnectPolicy, SocketTransport,
    TransportConfig, TransportEvent,
};

/// Default capacity of the transport event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a live feed.
#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    /// Transport settings.
    pub transport: TransportConfig,
    /// Capacity of the transport event channel.
    pub event_capacity: usize,
    /// Backoff for reconnecting after an unexpected close. `None` disables
    /// automatic reconnection.
    pub auto_reconnect: Option<ReconnectConfig>,
}

impl LiveFeedConfig {
    /// Create a configuration with defaults and no automatic reconnection.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::new(url),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            auto_reconnect: None,
        }
    }

    /// Enable automatic reconnection.
    #[must_use]
    pub fn with_auto_reconnect(mut self, config: ReconnectConfig) -> Self {
        self.auto_reconnect = Some(config);
        self
    }

    /// Create configuration from `FeedConfig`.
    #[must_use]
    pub fn from_feed_config(config: &crate::FeedConfig) -> Self {
        Self {
            transport: TransportConfig::from_settings(config.url.clone(), &config.transport),
            event_capacity: config.transport.event_capacity,
            auto_reconnect: config
                .auto_reconnect
                .enabled
                .then(|| ReconnectConfig::from_settings(&config.auto_reconnect)),
        }
    }
}

// =============================================================================
// Control Outcome
// =============================================================================

/// What happened to a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Handed to the connected transport.
    Sent,
    /// Dropped because the transport was not connected.
    Dropped,
}

impl ControlOutcome {
    /// Check if the command was sent.
    #[must_use]
    pub const fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

// =============================================================================
// Live Feed
// =============================================================================

/// A mounted live aircraft feed.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use adsb_live_feed::{AircraftSnapshot, LiveFeed, LiveFeedConfig};
///
/// # async fn example() {
/// let snapshot = Arc::new(AircraftSnapshot::new());
/// let feed = LiveFeed::mount(
///     LiveFeedConfig::new("ws://localhost:5000/ws/adsb"),
///     Arc::clone(&snapshot),
/// );
///
/// // Later, once connected
/// feed.start_tracking_all();
/// # }
/// ```
#[derive(Debug)]
pub struct LiveFeed {
    transport: SocketTransport,
    cancel: CancellationToken,
}

impl LiveFeed {
    /// Spawn the transport and event task, then connect.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn mount<L: FeedListener>(config: LiveFeedConfig, listener: L) -> Self {
        Self::mount_with_shutdown(config, listener, &CancellationToken::new())
    }

    /// Like [`LiveFeed::mount`], but also torn down when `shutdown` is
    /// cancelled.
    #[must_use]
    pub fn mount_with_shutdown<L: FeedListener>(
        config: LiveFeedConfig,
        listener: L,
        shutdown: &CancellationToken,
    ) -> Self {
        let cancel = shutdown.child_token();
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let transport = SocketTransport::spawn(config.transport, event_tx, cancel.clone());

        let events = FeedEvents {
            listener,
            transport: transport.clone(),
            policy: config.auto_reconnect.map(ReconnectPolicy::new),
        };
        tokio::spawn(events.run(event_rx, cancel.clone()));

        tracing::info!(
            connection_id = %transport.connection_id(),
            url = transport.url(),
            "Live feed mounted"
        );
        transport.connect();

        Self { transport, cancel }
    }

    /// Ask the server to stream updates for these aircraft.
    pub fn subscribe_to_aircraft<I, S>(&self, icao_codes: I) -> ControlOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<IcaoCode>,
    {
        self.command(FeedCommand::Subscribe {
            icao_codes: icao_codes.into_iter().map(Into::into).collect(),
        })
    }

    /// Ask the server to stop streaming updates for these aircraft.
    pub fn unsubscribe_from_aircraft<I, S>(&self, icao_codes: I) -> ControlOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<IcaoCode>,
    {
        self.command(FeedCommand::Unsubscribe {
            icao_codes: icao_codes.into_iter().map(Into::into).collect(),
        })
    }

    /// Ask the server for the full current state.
    pub fn request_snapshot(&self) -> ControlOutcome {
        self.command(FeedCommand::RequestSnapshot)
    }

    /// Ask the server to stream every aircraft.
    pub fn start_tracking_all(&self) -> ControlOutcome {
        self.command(FeedCommand::StartTrackingAll)
    }

    /// Ask the server to stop streaming every aircraft.
    pub fn stop_tracking_all(&self) -> ControlOutcome {
        self.command(FeedCommand::StopTrackingAll)
    }

    /// Send a control command if connected.
    pub fn command(&self, command: FeedCommand) -> ControlOutcome {
        if !self.transport.is_connected() {
            tracing::warn!(command = command.name(), "Cannot send command: feed is not connected");
            metrics::record_control_dropped(command.name());
            return ControlOutcome::Dropped;
        }

        tracing::debug!(command = command.name(), "Sending feed command");
        self.transport.send_json(&command);
        ControlOutcome::Sent
    }

    /// Connect manually.
    pub fn connect(&self) {
        self.transport.connect();
    }

    /// Disconnect manually. Automatic reconnection does not kick in.
    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    /// Disconnect and connect again after the transport's fixed delay.
    pub fn reconnect(&self) {
        self.transport.reconnect();
    }

    /// Whether the feed is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.watch_state()
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &SocketTransport {
        &self.transport
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        tracing::info!(connection_id = %self.transport.connection_id(), "Live feed unmounted");
        self.cancel.cancel();
    }
}

// =============================================================================
// Event Handling
// =============================================================================

struct FeedEvents<L> {
    listener: L,
    transport: SocketTransport,
    policy: Option<ReconnectPolicy>,
}

impl<L: FeedListener> FeedEvents<L> {
    async fn run(mut self, mut events: mpsc::Receiver<TransportEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.handle(event);
                }
            }
        }
        tracing::debug!("Live feed event task stopped");
    }

    fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                if let Some(policy) = self.policy.as_mut() {
                    policy.reset();
                }
                self.listener.on_open();
            }
            TransportEvent::Close(info) => {
                self.listener.on_close(&info);
                if info.initiated_locally {
                    return;
                }
                // A connect issued after this close was emitted owns the channel now.
                if self.transport.state() == ConnectionState::Disconnected {
                    self.schedule_reconnect();
                } else {
                    tracing::debug!(
                        state = %self.transport.state(),
                        "Channel already reconnecting; skipping automatic reconnect"
                    );
                }
            }
            TransportEvent::Error(error) => self.listener.on_error(&error),
            TransportEvent::Message(payload) => dispatch_message(&mut self.listener, &payload),
        }
    }

    fn schedule_reconnect(&mut self) {
        let Some(policy) = self.policy.as_mut() else {
            return;
        };

        if let Some(delay) = policy.next_delay() {
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Scheduling automatic reconnect"
            );
            self.transport.reconnect_after(delay);
        } else {
            let error = ReconnectError::MaxAttemptsExceeded(policy.attempt_count());
            tracing::error!(error = %error, "Giving up on automatic reconnect");
        }
    }
}

/// Interpret one inbound frame and notify the listener.
///
/// Only aircraft updates reach the listener; everything else is logged.
pub fn dispatch_message<L: FeedListener + ?Sized>(listener: &mut L, payload: &InboundPayload) {
    match FeedMessage::interpret(payload) {
        FeedMessage::AircraftUpdate(batch) => {
            tracing::debug!(count = batch.len(), "Aircraft update received");
            metrics::record_update_size(batch.len());
            listener.on_aircraft_update(batch);
        }
        FeedMessage::ConnectionStatus(status) => {
            tracing::info!(status = status.as_deref().unwrap_or("unknown"), "Feed connection status");
        }
        FeedMessage::Malformed { tag, error } => {
            tracing::warn!(tag = %tag, error = %error, "Malformed feed message");
            metrics::record_protocol_error("malformed");
        }
        FeedMessage::Unknown(tag) => {
            tracing::warn!(
                tag = tag.as_deref().unwrap_or("<none>"),
                kind = payload.kind(),
                "Unknown feed message type"
            );
            metrics::record_protocol_error("unknown");
        }
    }
}
