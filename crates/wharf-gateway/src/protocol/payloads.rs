//! Payload definitions for the `d` field of gateway frames

use serde::{Deserialize, Serialize};
use wharf_core::{Intents, Snowflake};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    /// Per-payload compression; unused when zlib-stream is negotiated
    #[serde(default)]
    pub compress: bool,
    pub large_threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// Online status shown for the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    Idle,
    /// Do not disturb
    Dnd,
    /// Shown as offline while still connected
    Invisible,
    Offline,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        })
    }
}

/// Activity kind, shown as "Playing", "Listening to", ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i8", into = "i8")]
pub enum ActivityType {
    Unknown,
    #[default]
    Playing,
    /// Only shows a stream link when `url` is set
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl From<i8> for ActivityType {
    fn from(value: i8) -> Self {
        match value {
            0 => Self::Playing,
            1 => Self::Streaming,
            2 => Self::Listening,
            3 => Self::Watching,
            4 => Self::Custom,
            5 => Self::Competing,
            _ => Self::Unknown,
        }
    }
}

impl From<ActivityType> for i8 {
    fn from(kind: ActivityType) -> Self {
        match kind {
            ActivityType::Unknown => -1,
            ActivityType::Playing => 0,
            ActivityType::Streaming => 1,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Custom => 4,
            ActivityType::Competing => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    pub fn new(kind: ActivityType, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: None,
        }
    }

    pub fn streaming(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityType::Streaming,
            url: Some(url.into()),
        }
    }
}

/// Payload for op 3 (Presence Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix millis the client went idle, if idle
    pub since: Option<u64>,
    pub activities: Vec<Activity>,
    pub status: Status,
    pub afk: bool,
}

impl PresenceUpdatePayload {
    pub fn new(status: Status) -> Self {
        Self {
            since: None,
            activities: Vec::new(),
            status,
            afk: false,
        }
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,
    /// Username prefix; empty with `limit = 0` requests everyone
    pub query: String,
    pub limit: u32,
    #[serde(default)]
    pub presences: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl RequestGuildMembersPayload {
    /// Request every member of a guild
    pub fn all(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            query: String::new(),
            limit: 0,
            presences: false,
            nonce: None,
        }
    }
}
