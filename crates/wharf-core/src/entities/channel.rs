//! Channel entity - a guild channel, DM, or group DM

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Channel type tag as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelType {
    /// Guild text channel
    #[default]
    GuildText,
    /// Direct message between two users
    Dm,
    /// Guild voice channel
    GuildVoice,
    /// Direct message between multiple users
    GroupDm,
    /// Guild category for organizing channels
    GuildCategory,
    /// Guild announcement channel
    GuildAnnouncement,
    GuildStageVoice,
    GuildForum,
    /// A type this library does not know about yet
    Unknown(u8),
}

impl From<u8> for ChannelType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildAnnouncement,
            13 => Self::GuildStageVoice,
            15 => Self::GuildForum,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(ct: ChannelType) -> Self {
        match ct {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildAnnouncement => 5,
            ChannelType::GuildStageVoice => 13,
            ChannelType::GuildForum => 15,
            ChannelType::Unknown(other) => other,
        }
    }
}

/// Channel entity
///
/// `guild_id` is a plain id; resolve the guild through the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
}

impl Channel {
    #[inline]
    pub fn is_dm(&self) -> bool {
        matches!(self.channel_type, ChannelType::Dm | ChannelType::GroupDm)
    }

    #[inline]
    pub fn is_voice(&self) -> bool {
        matches!(
            self.channel_type,
            ChannelType::GuildVoice | ChannelType::GuildStageVoice
        )
    }

    #[inline]
    pub fn is_guild_channel(&self) -> bool {
        self.guild_id.is_some()
    }

    /// Channel name, or a fallback for unnamed DMs
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Direct Message")
    }
}
