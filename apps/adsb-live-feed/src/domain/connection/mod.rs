//! Connection Lifecycle Types
//!
//! The state machine of a live channel and the information carried by a
//! close notification.
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open──► Connected
//!      ▲                          │                    │
//!      └────── failure / disconnect()  ◄── close / error ┘
//! ```

use std::fmt;

/// Lifecycle state of a socket transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No channel. Initial state.
    #[default]
    Disconnected,
    /// A channel is being opened.
    Connecting,
    /// The channel is open and frames flow both ways.
    Connected,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Check whether moving to `next` is a legal transition.
    ///
    /// `Connecting -> Connecting` is allowed: a new attempt replaces the
    /// pending one. `Connected -> Connected` is not; the channel must pass
    /// through `Disconnected` first.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connecting | Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of a channel close.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseInfo {
    /// WebSocket close code, when the peer sent one.
    pub code: Option<u16>,
    /// Close reason, possibly empty.
    pub reason: String,
    /// The close was requested on this side (`disconnect()` or teardown).
    pub initiated_locally: bool,
}

impl CloseInfo {
    /// A close requested on this side.
    #[must_use]
    pub const fn local() -> Self {
        Self {
            code: None,
            reason: String::new(),
            initiated_locally: true,
        }
    }

    /// A close caused by the peer or by a channel failure.
    #[must_use]
    pub fn remote(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            initiated_locally: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use ConnectionState::{Connected, Connecting, Disconnected};

    #[test_case(Disconnected, Connecting => true ; "connect from idle")]
    #[test_case(Connecting, Connected => true ; "open")]
    #[test_case(Connecting, Disconnected => true ; "connect failure")]
    #[test_case(Connecting, Connecting => true ; "replacing attempt")]
    #[test_case(Connected, Disconnected => true ; "close")]
    #[test_case(Connected, Connected => false ; "no reopen without close")]
    #[test_case(Connected, Connecting => false ; "no connect while open")]
    #[test_case(Disconnected, Connected => false ; "no open without connecting")]
    #[test_case(Disconnected, Disconnected => false ; "no double close")]
    fn transitions(from: ConnectionState, to: ConnectionState) -> bool {
        from.can_transition_to(to)
    }

    #[test]
    fn default_is_disconnected() {
        assert_eq!(ConnectionState::default(), Disconnected);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(Connected.to_string(), "connected");
        assert_eq!(Connecting.as_str(), "connecting");
    }

    #[test]
    fn close_info_constructors() {
        assert!(CloseInfo::local().initiated_locally);

        let remote = CloseInfo::remote(Some(1001), "going away");
        assert!(!remote.initiated_locally);
        assert_eq!(remote.code, Some(1001));
        assert_eq!(remote.reason, "going away");
    }
}
