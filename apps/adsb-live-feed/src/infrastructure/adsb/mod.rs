//! ADS-B Live Feed Adapter
//!
//! Speaks the aircraft feed protocol on top of a `SocketTransport`:
//!
//! - **messages**: Inbound interpretation and outbound control commands
//! - **feed**: `LiveFeed`, the mounted adapter with its control surface

pub mod feed;
pub mod messages;

pub use feed::{ControlOutcome, DEFAULT_EVENT_CAPACITY, LiveFeed, LiveFeedConfig, dispatch_message};
pub use messages::{FeedCommand, FeedMessage, OneOrMany};
