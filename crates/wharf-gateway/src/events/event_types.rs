//! Gateway event names
//!
//! The names sent in the `t` field of dispatch frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Known dispatch event names
///
/// Unknown names are still dispatched; this enum only covers the ones the
/// client gives special treatment or a typed parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventType {
    // Session
    Ready,
    Resumed,

    // Guilds
    GuildCreate,
    GuildUpdate,
    GuildDelete,

    // Channels
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,

    // Members
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,

    // Roles
    GuildRoleCreate,
    GuildRoleUpdate,
    GuildRoleDelete,

    // Messages
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageReactionAdd,
    MessageReactionRemove,

    // Users
    PresenceUpdate,
    TypingStart,
    UserUpdate,

    InteractionCreate,
}

impl GatewayEventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::GuildRoleCreate => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete => "GUILD_ROLE_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::TypingStart => "TYPING_START",
            Self::UserUpdate => "USER_UPDATE",
            Self::InteractionCreate => "INTERACTION_CREATE",
        }
    }

    /// Name handlers subscribe under
    #[must_use]
    pub const fn handler_name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Resumed => "resumed",
            Self::GuildCreate => "guild_create",
            Self::GuildUpdate => "guild_update",
            Self::GuildDelete => "guild_delete",
            Self::ChannelCreate => "channel_create",
            Self::ChannelUpdate => "channel_update",
            Self::ChannelDelete => "channel_delete",
            Self::GuildMemberAdd => "guild_member_add",
            Self::GuildMemberUpdate => "guild_member_update",
            Self::GuildMemberRemove => "guild_member_remove",
            Self::GuildRoleCreate => "guild_role_create",
            Self::GuildRoleUpdate => "guild_role_update",
            Self::GuildRoleDelete => "guild_role_delete",
            Self::MessageCreate => "message_create",
            Self::MessageUpdate => "message_update",
            Self::MessageDelete => "message_delete",
            Self::MessageReactionAdd => "message_reaction_add",
            Self::MessageReactionRemove => "message_reaction_remove",
            Self::PresenceUpdate => "presence_update",
            Self::TypingStart => "typing_start",
            Self::UserUpdate => "user_update",
            Self::InteractionCreate => "interaction_create",
        }
    }

    /// Parse an event name
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "RESUMED" => Some(Self::Resumed),
            "GUILD_CREATE" => Some(Self::GuildCreate),
            "GUILD_UPDATE" => Some(Self::GuildUpdate),
            "GUILD_DELETE" => Some(Self::GuildDelete),
            "CHANNEL_CREATE" => Some(Self::ChannelCreate),
            "CHANNEL_UPDATE" => Some(Self::ChannelUpdate),
            "CHANNEL_DELETE" => Some(Self::ChannelDelete),
            "GUILD_MEMBER_ADD" => Some(Self::GuildMemberAdd),
            "GUILD_MEMBER_UPDATE" => Some(Self::GuildMemberUpdate),
            "GUILD_MEMBER_REMOVE" => Some(Self::GuildMemberRemove),
            "GUILD_ROLE_CREATE" => Some(Self::GuildRoleCreate),
            "GUILD_ROLE_UPDATE" => Some(Self::GuildRoleUpdate),
            "GUILD_ROLE_DELETE" => Some(Self::GuildRoleDelete),
            "MESSAGE_CREATE" => Some(Self::MessageCreate),
            "MESSAGE_UPDATE" => Some(Self::MessageUpdate),
            "MESSAGE_DELETE" => Some(Self::MessageDelete),
            "MESSAGE_REACTION_ADD" => Some(Self::MessageReactionAdd),
            "MESSAGE_REACTION_REMOVE" => Some(Self::MessageReactionRemove),
            "PRESENCE_UPDATE" => Some(Self::PresenceUpdate),
            "TYPING_START" => Some(Self::TypingStart),
            "USER_UPDATE" => Some(Self::UserUpdate),
            "INTERACTION_CREATE" => Some(Self::InteractionCreate),
            _ => None,
        }
    }

    /// Whether the engine updates session or cache state before dispatching
    #[must_use]
    pub const fn is_intercepted(self) -> bool {
        matches!(
            self,
            Self::Ready
                | Self::Resumed
                | Self::GuildCreate
                | Self::GuildDelete
                | Self::GuildMemberAdd
                | Self::GuildMemberRemove
                | Self::ChannelDelete
        )
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<GatewayEventType> for String {
    fn from(event: GatewayEventType) -> Self {
        event.as_str().to_string()
    }
}
