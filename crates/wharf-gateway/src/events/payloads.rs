//! Dispatch payloads that have no entity record of their own
//!
//! Events whose body is an entity (GUILD_CREATE, CHANNEL_*, GUILD_MEMBER_ADD,
//! MESSAGE_*) deserialize straight into the `wharf_core` records.

use serde::{Deserialize, Serialize};
use wharf_core::{Role, Snowflake, User};

/// READY payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    pub v: u8,
    pub user: User,
    /// Guilds that will follow as GUILD_CREATE
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    /// URL to dial when resuming this session
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// GUILD_DELETE payload
///
/// `unavailable` is set during an outage; unset means the bot left the guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildDeleteEvent {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// GUILD_MEMBER_REMOVE payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMemberRemoveEvent {
    pub guild_id: Snowflake,
    pub user: User,
}

/// GUILD_ROLE_CREATE / GUILD_ROLE_UPDATE payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleEvent {
    pub guild_id: Snowflake,
    pub role: Role,
}

/// GUILD_ROLE_DELETE payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRoleDeleteEvent {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

/// MESSAGE_DELETE payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleteEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}
