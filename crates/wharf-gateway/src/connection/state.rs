//! Connection lifecycle state

use std::fmt;

/// Where a gateway connection is in its lifecycle
///
/// `Disconnected → Connecting → AwaitingHello → Identifying | Resuming →
/// Ready → Closing → Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Socket is being opened
    Connecting,
    /// Socket is open, waiting for op 10
    AwaitingHello,
    /// IDENTIFY sent, waiting for READY
    Identifying,
    /// RESUME sent, waiting for RESUMED
    Resuming,
    /// Session established and heartbeating
    Ready,
    /// Socket is being torn down
    Closing,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Ready => "ready",
            Self::Closing => "closing",
        }
    }

    /// Whether a socket is (or is about to be) open
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Closing)
    }

    /// Whether a handshake is in flight
    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        matches!(self, Self::AwaitingHello | Self::Identifying | Self::Resuming)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
