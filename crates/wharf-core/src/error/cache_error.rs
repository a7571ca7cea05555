//! Cache errors - raised when an operation references an entity the cache
//! does not hold
//!
//! These indicate a protocol-ordering problem (an event arrived for a guild
//! the gateway never announced) and are logged at error level by callers.

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Cache integrity errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    // =========================================================================
    // Missing Owners
    // =========================================================================
    #[error("Guild not found in cache: {0}")]
    GuildNotFound(Snowflake),

    // =========================================================================
    // Missing Dependents
    // =========================================================================
    #[error("Channel not found in cache: {0}")]
    ChannelNotFound(Snowflake),

    #[error("Role not found in cache: {0}")]
    RoleNotFound(Snowflake),

    #[error("Member {user_id} not found in guild {guild_id}")]
    MemberNotFound {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    #[error("User not found in cache: {0}")]
    UserNotFound(Snowflake),

    // =========================================================================
    // Ownership Violations
    // =========================================================================
    #[error("Channel {channel_id} has no owning guild")]
    MissingGuildId { channel_id: Snowflake },
}

impl CacheError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::GuildNotFound(_) => "UNKNOWN_GUILD",
            Self::ChannelNotFound(_) => "UNKNOWN_CHANNEL",
            Self::RoleNotFound(_) => "UNKNOWN_ROLE",
            Self::MemberNotFound { .. } => "UNKNOWN_MEMBER",
            Self::UserNotFound(_) => "UNKNOWN_USER",
            Self::MissingGuildId { .. } => "MISSING_GUILD_ID",
        }
    }

    /// True when the owning guild itself is absent
    pub fn is_missing_guild(&self) -> bool {
        matches!(self, Self::GuildNotFound(_) | Self::MissingGuildId { .. })
    }
}
