//! Feed Configuration Settings
//!
//! Configuration types for the live feed, loaded from environment variables.
//! Unparseable numbers fall back to their defaults.

use std::time::Duration;

use crate::domain::aircraft::{IcaoCode, normalize_icao};

/// Default feed endpoint.
pub const DEFAULT_FEED_URL: &str = "ws://localhost:5000/ws/adsb";

/// Transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Limit for the opening handshake.
    pub connect_timeout: Duration,
    /// Delay used by a manual reconnect.
    pub reconnect_delay: Duration,
    /// Capacity of the transport event channel.
    pub event_capacity: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_millis(1000),
            event_capacity: 1024,
        }
    }
}

/// Automatic reconnection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoReconnectSettings {
    /// Whether the feed reconnects by itself after an unexpected close.
    pub enabled: bool,
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for AutoReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_initial: Duration::from_millis(1000),
            delay_max: Duration::from_secs(30),
            delay_multiplier: 2.0,
            max_attempts: 0, // Unlimited
        }
    }
}

/// What the binary tracks and how it reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSettings {
    /// Aircraft to subscribe to. Empty means track everything.
    pub icao_codes: Vec<IcaoCode>,
    /// How often the snapshot summary is logged.
    pub snapshot_log_interval: Duration,
    /// Aircraft not refreshed for this long are pruned.
    pub stale_after: Duration,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            icao_codes: Vec::new(),
            snapshot_log_interval: Duration::from_secs(30),
            stale_after: Duration::from_secs(300),
        }
    }
}

impl TrackingSettings {
    /// Check if every aircraft is tracked.
    #[must_use]
    pub fn tracks_all(&self) -> bool {
        self.icao_codes.is_empty()
    }
}

/// Complete feed configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Feed endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Transport settings.
    pub transport: TransportSettings,
    /// Automatic reconnection settings.
    pub auto_reconnect: AutoReconnectSettings,
    /// Tracking settings.
    pub tracking: TrackingSettings,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            transport: TransportSettings::default(),
            auto_reconnect: AutoReconnectSettings::default(),
            tracking: TrackingSettings::default(),
            metrics_port: 0,
        }
    }
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `ADSB_FEED_URL` is empty or not a WebSocket URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = Env(lookup);

        let url = match lookup("ADSB_FEED_URL") {
            Some(url) => validate_url(url.trim())?,
            None => defaults.url,
        };

        let transport = TransportSettings {
            connect_timeout: env.duration_secs(
                "ADSB_FEED_CONNECT_TIMEOUT_SECS",
                defaults.transport.connect_timeout,
            ),
            reconnect_delay: env.duration_millis(
                "ADSB_FEED_RECONNECT_DELAY_MS",
                defaults.transport.reconnect_delay,
            ),
            event_capacity: env.parse("ADSB_FEED_EVENT_CAPACITY", defaults.transport.event_capacity),
        };

        let auto_reconnect = AutoReconnectSettings {
            enabled: env.flag("ADSB_FEED_AUTO_RECONNECT", defaults.auto_reconnect.enabled),
            delay_initial: env.duration_millis(
                "ADSB_FEED_RECONNECT_DELAY_INITIAL_MS",
                defaults.auto_reconnect.delay_initial,
            ),
            delay_max: env.duration_secs(
                "ADSB_FEED_RECONNECT_DELAY_MAX_SECS",
                defaults.auto_reconnect.delay_max,
            ),
            delay_multiplier: env.parse(
                "ADSB_FEED_RECONNECT_DELAY_MULTIPLIER",
                defaults.auto_reconnect.delay_multiplier,
            ),
            max_attempts: env.parse(
                "ADSB_FEED_MAX_RECONNECT_ATTEMPTS",
                defaults.auto_reconnect.max_attempts,
            ),
        };

        let tracking = TrackingSettings {
            icao_codes: lookup("ADSB_FEED_TRACK")
                .map(|codes| parse_icao_list(&codes))
                .unwrap_or_default(),
            snapshot_log_interval: env.duration_secs(
                "ADSB_FEED_SNAPSHOT_LOG_SECS",
                defaults.tracking.snapshot_log_interval,
            ),
            stale_after: env.duration_secs(
                "ADSB_FEED_STALE_AFTER_SECS",
                defaults.tracking.stale_after,
            ),
        };

        Ok(Self {
            url,
            transport,
            auto_reconnect,
            tracking,
            metrics_port: env.parse("ADSB_FEED_METRICS_PORT", defaults.metrics_port),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// The feed URL is not a WebSocket URL.
    #[error("invalid feed URL {0:?}: expected ws:// or wss://")]
    InvalidUrl(String),
}

fn validate_url(url: &str) -> Result<String, ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::EmptyValue("ADSB_FEED_URL".to_string()));
    }

    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("wss://")
        .or_else(|| lower.strip_prefix("ws://"));

    match rest {
        Some(host) if !host.is_empty() => Ok(url.to_string()),
        _ => Err(ConfigError::InvalidUrl(url.to_string())),
    }
}

fn parse_icao_list(codes: &str) -> Vec<IcaoCode> {
    codes
        .split(',')
        .map(normalize_icao)
        .filter(|code| !code.is_empty())
        .collect()
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        (self.0)(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        (self.0)(key).map_or(default, |v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        })
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        (self.0)(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        (self.0)(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
