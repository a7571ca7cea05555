//! Message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Embed, User};
use crate::value_objects::Snowflake;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// Attachment metadata returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
}

impl Message {
    #[inline]
    pub fn is_from_bot(&self) -> bool {
        self.author.bot
    }

    #[inline]
    pub fn is_dm(&self) -> bool {
        self.guild_id.is_none()
    }
}
