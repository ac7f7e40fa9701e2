//! Socket Transport
//!
//! Owns one logical WebSocket connection to a server endpoint and hides
//! connect, disconnect, reconnect and message framing behind a small
//! non-blocking handle.
//!
//! # Execution Model
//!
//! Every transport has a single driver task. Commands from the handle,
//! connect attempt results, inbound frames and the reconnect timer are all
//! handled one at a time inside the driver's `select!` loop, so no two
//! lifecycle steps ever interleave.
//!
//! ```text
//! SocketTransport ──Command──► Driver ──TransportEvent──► consumer
//!   connect()                   │  ▲
//!   send()                      ▼  │
//!   disconnect()              WebSocket
//!   reconnect()
//! ```
//!
//! # Delivery
//!
//! - `send()` while not connected appends to an outbound queue. The queue is
//!   drained in FIFO order as soon as the channel opens, before `Open` is
//!   emitted and before any later command is looked at.
//! - Inbound frames are decoded as JSON; anything else is forwarded raw.
//! - `is_connected()` is updated before the matching event is emitted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::codec::{CodecError, FrameCodec, InboundPayload, OutboundFrame};
use super::queue::OutboundQueue;
use crate::domain::connection::{CloseInfo, ConnectionState};
use crate::infrastructure::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Upper bound for sending our close frame on disconnect.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Error Type
// =============================================================================

/// Channel-level failures. These are reported through
/// `TransportEvent::Error`, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The opening handshake did not finish in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Codec(_) => "codec",
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Lifecycle notifications emitted by the transport, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The channel opened and the outbound queue was flushed.
    Open,
    /// The channel closed.
    Close(CloseInfo),
    /// The channel reported an error.
    Error(String),
    /// A frame arrived.
    Message(InboundPayload),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a socket transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Limit for the opening handshake.
    pub connect_timeout: Duration,
    /// Delay used by `reconnect()`.
    pub reconnect_delay: Duration,
}

impl TransportConfig {
    /// Create a configuration with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    /// Create configuration from `TransportSettings`.
    #[must_use]
    pub fn from_settings(url: impl Into<String>, settings: &crate::TransportSettings) -> Self {
        Self {
            url: url.into(),
            connect_timeout: settings.connect_timeout,
            reconnect_delay: settings.reconnect_delay,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

enum Command {
    Connect,
    Disconnect,
    Send(OutboundFrame),
    Reconnect(Duration),
}

#[derive(Debug)]
struct Shared {
    connected: AtomicBool,
    queued: AtomicUsize,
    state: watch::Sender<ConnectionState>,
}

/// Handle to a socket transport.
///
/// Cloning is cheap; every clone drives the same connection. All methods
/// return immediately and never fail. Cancelling the token passed to
/// [`SocketTransport::spawn`] (or calling [`SocketTransport::shutdown`])
/// closes the channel, cancels a pending reconnect and stops the driver.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    id: Uuid,
    url: Arc<str>,
    reconnect_delay: Duration,
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => f.write_str("Connect"),
            Self::Disconnect => f.write_str("Disconnect"),
            Self::Send(_) => f.write_str("Send"),
            Self::Reconnect(delay) => write!(f, "Reconnect({delay:?})"),
        }
    }
}

impl SocketTransport {
    /// Start the driver task. The transport begins `Disconnected`.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn spawn(
        config: TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            state: state_tx,
        });

        let handle = Self {
            id,
            url: Arc::from(config.url.as_str()),
            reconnect_delay: config.reconnect_delay,
            commands: command_tx,
            shared: Arc::clone(&shared),
            cancel: cancel.clone(),
        };

        let span = tracing::info_span!("socket_transport", connection_id = %id, url = %config.url);
        let driver = Driver::new(config, shared, command_rx, event_tx, cancel);
        tokio::spawn(driver.run().instrument(span));

        handle
    }

    /// Open the channel. Warns and does nothing if already connected.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close the channel if open. Idempotent.
    ///
    /// `is_connected()` reads `false` as soon as this returns, and a pending
    /// `reconnect()` is cancelled.
    pub fn disconnect(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.command(Command::Disconnect);
    }

    /// Send a frame now if connected, otherwise queue it for the next open.
    pub fn send(&self, frame: impl Into<OutboundFrame>) {
        self.command(Command::Send(frame.into()));
    }

    /// Send any serializable value as a JSON frame.
    ///
    /// A value that cannot be encoded is logged and dropped.
    pub fn send_json<T: Serialize>(&self, value: &T) {
        match OutboundFrame::structured(value) {
            Ok(frame) => self.send(frame),
            Err(e) => tracing::error!(connection_id = %self.id, error = %e, "Error encoding WebSocket message"),
        }
    }

    /// Disconnect, then connect again after the configured delay.
    pub fn reconnect(&self) {
        self.reconnect_after(self.reconnect_delay);
    }

    /// Disconnect, then connect again after `delay`.
    ///
    /// Replaces any reconnect that is still pending.
    pub fn reconnect_after(&self, delay: Duration) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.command(Command::Reconnect(delay));
    }

    /// Whether the channel is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Current lifecycle state as last published by the driver.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Frames waiting for the channel to open.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Identifier used in logs.
    #[must_use]
    pub const fn connection_id(&self) -> Uuid {
        self.id
    }

    /// Target address.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Tear the transport down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the transport has been torn down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn command(&self, command: Command) {
        if let Err(e) = self.commands.send(command) {
            tracing::debug!(connection_id = %self.id, command = ?e.0, "Transport stopped, command ignored");
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

struct ConnectAttempt {
    generation: u64,
    result: Result<WsStream, TransportError>,
}

struct Driver {
    config: TransportConfig,
    codec: FrameCodec,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
    queue: OutboundQueue,
    generation: u64,
    attempt_tx: mpsc::UnboundedSender<ConnectAttempt>,
    attempt_rx: mpsc::UnboundedReceiver<ConnectAttempt>,
    attempt_task: Option<JoinHandle<()>>,
    sink: Option<WsSink>,
    source: Option<WsSource>,
    reconnect_at: Option<Instant>,
}

impl Driver {
    fn new(
        config: TransportConfig,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::Sender<TransportEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        Self {
            config,
            codec: FrameCodec::new(),
            shared,
            commands,
            events,
            cancel,
            queue: OutboundQueue::new(),
            generation: 0,
            attempt_tx,
            attempt_rx,
            attempt_task: None,
            sink: None,
            source: None,
            reconnect_at: None,
        }
    }

    async fn run(mut self) {
        tracing::debug!("Transport driver started");

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    tracing::debug!("Transport cancelled");
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("All transport handles dropped");
                        break;
                    };
                    self.handle_command(command).await;
                }
                Some(attempt) = self.attempt_rx.recv() => {
                    self.handle_attempt(attempt).await;
                }
                () = reconnect_due(self.reconnect_at) => {
                    self.reconnect_at = None;
                    tracing::info!("Reconnect delay elapsed");
                    self.start_connect();
                }
                frame = next_frame(&mut self.source) => {
                    self.handle_frame(frame).await;
                }
            }
        }

        self.disconnect().await;
        tracing::debug!("Transport driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.start_connect(),
            Command::Disconnect => self.disconnect().await,
            Command::Send(frame) => self.handle_send(frame).await,
            Command::Reconnect(delay) => {
                self.disconnect().await;
                self.reconnect_at = Some(Instant::now() + delay);
                metrics::record_reconnect();
                tracing::info!(delay_ms = delay.as_millis(), "Reconnect scheduled");
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let current = self.state();
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "Ignoring invalid state transition");
            return;
        }

        let connected = next == ConnectionState::Connected;
        self.shared.connected.store(connected, Ordering::SeqCst);
        self.shared.state.send_replace(next);
        metrics::set_connected(connected);
    }

    async fn emit(&self, event: TransportEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Transport event receiver dropped");
        }
    }

    // -------------------------------------------------------------------------
    // Connect
    // -------------------------------------------------------------------------

    fn start_connect(&mut self) {
        if self.state() == ConnectionState::Connected {
            tracing::warn!("WebSocket is already connected");
            return;
        }

        self.reconnect_at = None;
        self.abort_attempt();
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        let generation = self.generation;
        let url = self.config.url.clone();
        let timeout = self.config.connect_timeout;
        let attempt_tx = self.attempt_tx.clone();

        tracing::info!(generation, "Connecting to WebSocket");

        let task = async move {
            let result =
                match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()))
                    .await
                {
                    Ok(Ok((stream, _response))) => Ok(stream),
                    Ok(Err(e)) => Err(TransportError::from(e)),
                    Err(_) => Err(TransportError::ConnectTimeout(timeout)),
                };
            let _ = attempt_tx.send(ConnectAttempt { generation, result });
        };
        self.attempt_task = Some(tokio::spawn(task.in_current_span()));
    }

    fn abort_attempt(&mut self) {
        if let Some(task) = self.attempt_task.take() {
            task.abort();
        }
    }

    async fn handle_attempt(&mut self, attempt: ConnectAttempt) {
        if attempt.generation != self.generation {
            tracing::debug!(
                generation = attempt.generation,
                current = self.generation,
                "Discarding superseded connect attempt"
            );
            return;
        }
        self.attempt_task = None;

        match attempt.result {
            Ok(stream) => self.on_open(stream).await,
            Err(e) => {
                tracing::error!(error = %e, "WebSocket connection failed");
                metrics::record_transport_error(e.kind());
                let reason = e.to_string();
                self.set_state(ConnectionState::Disconnected);
                self.emit(TransportEvent::Error(reason.clone())).await;
                self.emit(TransportEvent::Close(CloseInfo::remote(None, reason)))
                    .await;
            }
        }
    }

    async fn on_open(&mut self, stream: WsStream) {
        let (sink, source) = stream.split();
        self.sink = Some(sink);
        self.source = Some(source);
        self.set_state(ConnectionState::Connected);
        tracing::info!("WebSocket connected");

        if self.flush_queue().await {
            self.emit(TransportEvent::Open).await;
        }
    }

    /// Drain the outbound queue onto the open channel.
    ///
    /// Returns `false` if the channel failed part-way; unsent frames are
    /// put back in the queue.
    async fn flush_queue(&mut self) -> bool {
        let pending = self.queue.take_all();
        self.shared.queued.store(0, Ordering::SeqCst);
        if pending.is_empty() {
            return true;
        }

        tracing::debug!(count = pending.len(), "Flushing queued messages");
        metrics::record_queue_flushed(pending.len());

        let mut pending = pending.into_iter();
        while let Some(frame) = pending.next() {
            match self.transmit(&frame).await {
                Ok(()) => {}
                Err(TransportError::Codec(e)) => {
                    tracing::error!(error = %e, "Error encoding WebSocket message");
                }
                Err(e) => {
                    self.enqueue(frame);
                    for rest in pending {
                        self.enqueue(rest);
                    }
                    self.fail_channel(&e).await;
                    return false;
                }
            }
        }

        true
    }

    // -------------------------------------------------------------------------
    // Send
    // -------------------------------------------------------------------------

    async fn handle_send(&mut self, frame: OutboundFrame) {
        if self.state() != ConnectionState::Connected {
            self.enqueue(frame);
            tracing::debug!(queued = self.queue.len(), "WebSocket not connected, queuing message");
            return;
        }

        match self.transmit(&frame).await {
            Ok(()) => {}
            Err(TransportError::Codec(e)) => {
                tracing::error!(error = %e, "Error encoding WebSocket message");
            }
            Err(e) => self.fail_channel(&e).await,
        }
    }

    fn enqueue(&mut self, frame: OutboundFrame) {
        self.queue.push(frame);
        self.shared.queued.store(self.queue.len(), Ordering::SeqCst);
        metrics::record_frame_queued();
    }

    async fn transmit(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
        let text = self.codec.encode(frame)?;
        let Some(sink) = self.sink.as_mut() else {
            return Err(TransportError::WebSocket(tungstenite::Error::AlreadyClosed));
        };

        sink.send(Message::Text(text.into())).await?;
        metrics::record_frame_sent();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Receive
    // -------------------------------------------------------------------------

    async fn handle_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => {
                let payload = self.codec.decode_text(text.as_str());
                metrics::record_frame_received(payload.kind());
                self.emit(TransportEvent::Message(payload)).await;
            }
            Some(Ok(Message::Binary(data))) => {
                let payload = self.codec.decode_binary(&data);
                metrics::record_frame_received(payload.kind());
                self.emit(TransportEvent::Message(payload)).await;
            }
            Some(Ok(Message::Close(frame))) => {
                let info = frame.map_or_else(
                    || CloseInfo::remote(None, ""),
                    |f| CloseInfo::remote(Some(u16::from(f.code)), f.reason.as_str()),
                );
                self.close_channel(info).await;
            }
            Some(Ok(_)) => {
                // Ping/pong and raw frames are handled by tungstenite
            }
            Some(Err(e)) => {
                let e = TransportError::from(e);
                self.fail_channel(&e).await;
            }
            None => {
                self.close_channel(CloseInfo::remote(None, "stream ended"))
                    .await;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Report a channel error, then close.
    async fn fail_channel(&mut self, error: &TransportError) {
        tracing::error!(error = %error, "WebSocket error");
        metrics::record_transport_error(error.kind());
        self.emit(TransportEvent::Error(error.to_string())).await;
        self.close_channel(CloseInfo::remote(None, error.to_string()))
            .await;
    }

    /// The channel is gone without us asking.
    async fn close_channel(&mut self, info: CloseInfo) {
        self.sink = None;
        self.source = None;
        if self.state() != ConnectionState::Disconnected {
            self.set_state(ConnectionState::Disconnected);
        }

        tracing::info!(code = ?info.code, reason = %info.reason, "WebSocket disconnected");
        self.emit(TransportEvent::Close(info)).await;
    }

    /// Local close. Cancels any pending reconnect and in-flight attempt.
    async fn disconnect(&mut self) {
        self.reconnect_at = None;
        self.abort_attempt();
        self.generation += 1;

        self.source = None;
        if let Some(mut sink) = self.sink.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Error closing WebSocket"),
                Err(_) => tracing::debug!("Timed out closing WebSocket"),
            }
        }

        if self.state() == ConnectionState::Disconnected {
            self.shared.connected.store(false, Ordering::SeqCst);
            return;
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("WebSocket disconnected");
        self.emit(TransportEvent::Close(CloseInfo::local())).await;
    }
}

async fn next_frame(source: &mut Option<WsSource>) -> Option<Result<Message, tungstenite::Error>> {
    match source {
        Some(source) => source.next().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_due(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_config_defaults() {
        let config = TransportConfig::new("ws://localhost:5000/ws/adsb");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
    }

    #[test]
    fn transport_config_from_settings() {
        let settings = crate::TransportSettings {
            connect_timeout: Duration::from_secs(3),
            reconnect_delay: Duration::from_millis(250),
            event_capacity: 16,
        };

        let config = TransportConfig::from_settings("ws://example", &settings);

        assert_eq!(config.url, "ws://example");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            TransportError::ConnectTimeout(Duration::from_secs(1)).kind(),
            "connect_timeout"
        );
        assert_eq!(
            TransportError::WebSocket(tungstenite::Error::AlreadyClosed).kind(),
            "websocket"
        );
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let (tx, _rx) = mpsc::channel(8);
        let transport = SocketTransport::spawn(
            TransportConfig::new("ws://127.0.0.1:9"),
            tx,
            CancellationToken::new(),
        );

        assert!(!transport.is_connected());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.queued_len(), 0);
        assert_eq!(transport.url(), "ws://127.0.0.1:9");

        transport.shutdown();
        assert!(transport.is_shut_down());
    }

    #[tokio::test]
    async fn send_while_disconnected_queues() {
        let (tx, _rx) = mpsc::channel(8);
        let transport = SocketTransport::spawn(
            TransportConfig::new("ws://127.0.0.1:9"),
            tx,
            CancellationToken::new(),
        );

        transport.send("first");
        transport.send_json(&serde_json::json!({"type": "request_snapshot"}));

        let deadline = Instant::now() + Duration::from_secs(2);
        while transport.queued_len() < 2 && Instant::now() < deadline {
            tokio::task::yield_now().await;
        }

        assert_eq!(transport.queued_len(), 2);
        assert!(!transport.is_connected());
        transport.shutdown();
    }

    #[tokio::test]
    async fn disconnect_when_idle_emits_nothing() {
        let (tx, mut rx) = mpsc::channel(8);
        let transport = SocketTransport::spawn(
            TransportConfig::new("ws://127.0.0.1:9"),
            tx,
            CancellationToken::new(),
        );

        transport.disconnect();
        transport.disconnect();
        transport.send("marker");

        let deadline = Instant::now() + Duration::from_secs(2);
        while transport.queued_len() < 1 && Instant::now() < deadline {
            tokio::task::yield_now().await;
        }

        assert!(rx.try_recv().is_err());
        transport.shutdown();
    }
}
