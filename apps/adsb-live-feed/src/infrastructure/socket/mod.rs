//! Socket Transport Adapter
//!
//! A reusable WebSocket channel with connection lifecycle management:
//!
//! - **transport**: Handle and driver task for one logical connection
//! - **codec**: JSON framing with raw fallback for inbound frames
//! - **queue**: FIFO of frames sent before the channel opened
//! - **reconnect**: Backoff schedule for automatic reconnection

pub mod codec;
pub mod queue;
pub mod reconnect;
pub mod transport;

pub use codec::{CodecError, FrameCodec, InboundPayload, OutboundFrame};
pub use queue::OutboundQueue;
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use transport::{SocketTransport, TransportConfig, TransportError, TransportEvent};
