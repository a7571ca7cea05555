//! Member entity - a user's membership in one guild

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;
use crate::value_objects::Snowflake;

/// Member payload as sent by REST and the gateway
///
/// `guild_id` is only present on gateway member events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Cached member, keyed by (guild id, user id)
///
/// Holds ids only; the user and roles are resolved through the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub nick: Option<String>,
    pub avatar: Option<String>,
    pub role_ids: Vec<Snowflake>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn from_payload(guild_id: Snowflake, payload: &MemberPayload) -> Self {
        Self {
            guild_id,
            user_id: payload.user.id,
            nick: payload.nick.clone(),
            avatar: payload.avatar.clone(),
            role_ids: payload.roles.clone(),
            joined_at: payload.joined_at,
        }
    }

    #[inline]
    pub fn key(&self) -> (Snowflake, Snowflake) {
        (self.guild_id, self.user_id)
    }

    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.role_ids.contains(&role_id)
    }

    /// Nickname if set, otherwise the given fallback
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(username)
    }
}
