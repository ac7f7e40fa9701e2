//! Configuration Module
//!
//! Environment-driven configuration for the live feed binary.

mod settings;

pub use settings::{
    AutoReconnectSettings, ConfigError, DEFAULT_FEED_URL, FeedConfig, TrackingSettings,
    TransportSettings,
};
