//! Gateway operation codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Gateway operation codes
///
/// The op code says what kind of frame the `d` field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// An event was dispatched (receive)
    Dispatch = 0,
    /// Keep the connection alive (send; the server may also request one)
    Heartbeat = 1,
    /// Start a new session (send)
    Identify = 2,
    /// Update the bot's presence (send)
    PresenceUpdate = 3,
    /// Join, move or leave voice channels (send)
    VoiceStateUpdate = 4,
    /// Resume a dropped session (send)
    Resume = 6,
    /// Reconnect and resume immediately (receive)
    Reconnect = 7,
    /// Request offline members of a large guild (send)
    RequestGuildMembers = 8,
    /// The session has been invalidated (receive)
    InvalidSession = 9,
    /// First frame after connecting, carries the heartbeat interval (receive)
    Hello = 10,
    /// A heartbeat was received (receive)
    HeartbeatAck = 11,
}

impl OpCode {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the client may send this op
    #[must_use]
    pub const fn is_sendable(self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::Identify
                | Self::PresenceUpdate
                | Self::VoiceStateUpdate
                | Self::Resume
                | Self::RequestGuildMembers
        )
    }

    /// Ops a user may queue on a live session
    ///
    /// Heartbeat, identify and resume belong to the connection engine.
    #[must_use]
    pub const fn is_user_command(self) -> bool {
        matches!(
            self,
            Self::PresenceUpdate | Self::VoiceStateUpdate | Self::RequestGuildMembers
        )
    }

    /// Whether the server may send this op
    #[must_use]
    pub const fn is_receivable(self) -> bool {
        matches!(
            self,
            Self::Dispatch
                | Self::Heartbeat
                | Self::Reconnect
                | Self::InvalidSession
                | Self::Hello
                | Self::HeartbeatAck
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl Serialize for OpCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for OpCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown op code: {value}")))
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}
