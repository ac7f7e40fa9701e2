//! Reconnection Policy
//!
//! Backoff schedule used when the live feed reconnects on its own after an
//! unexpected close. Manual `reconnect()` calls on the transport do not go
//! through this policy; they use the transport's fixed delay.

use std::time::Duration;

use rand::Rng;

/// Configuration for automatic reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts allowed before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// A schedule that always waits `delay` and never gives up.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Create configuration from `AutoReconnectSettings`.
    ///
    /// A multiplier below 1.0, or one that is not finite, is raised to 1.0 so
    /// delays never shrink.
    #[must_use]
    pub fn from_settings(settings: &crate::AutoReconnectSettings) -> Self {
        let requested = settings.delay_multiplier;
        let multiplier = if requested.is_finite() && requested >= 1.0 {
            requested
        } else {
            1.0
        };

        Self {
            initial_delay: settings.delay_initial,
            max_delay: settings.delay_max,
            multiplier,
            jitter_factor: 0.1,
            max_attempts: settings.max_attempts,
        }
    }
}

/// Exponential backoff with jitter.
///
/// # Example
///
/// ```rust
/// use adsb_live_feed::infrastructure::socket::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig {
///     jitter_factor: 0.0,
///     ..ReconnectConfig::default()
/// });
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
///
/// // Connection came back
/// policy.reset();
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    next_base: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let next_base = config.initial_delay;
        Self {
            config,
            next_base,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }
        self.attempts += 1;

        let delay = self.jittered(self.next_base);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.next_base.as_millis() as f64 * self.config.multiplier).round();
        let max_millis = u64::try_from(self.config.max_delay.as_millis()).unwrap_or(u64::MAX);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        if scaled.is_finite() && scaled > 0.0 {
            self.next_base = Duration::from_millis((scaled as u64).min(max_millis));
        }

        Some(delay)
    }

    /// Start over after a successful connection.
    pub const fn reset(&mut self) {
        self.next_base = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Attempts handed out since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Check if another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempts < self.config.max_attempts
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = base.as_millis() as f64;
        let spread = base_millis * self.config.jitter_factor;
        let offset: f64 = rand::rng().random_range(-spread..=spread);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (base_millis + offset).max(1.0) as u64;
        Duration::from_millis(millis)
    }
}

/// Error type for reconnection failures.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxAttemptsExceeded(u32),
}
