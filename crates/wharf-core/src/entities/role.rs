//! Role entity - owned by exactly one guild

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Role record
///
/// The REST and gateway payloads omit the owning guild; the cache fills
/// `guild_id` in on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    #[serde(default, skip_serializing)]
    pub guild_id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub mentionable: bool,
    /// Permission bits as the decimal string the API sends
    #[serde(default)]
    pub permissions: String,
}

impl Role {
    /// The @everyone role shares its id with the guild
    #[inline]
    pub fn is_everyone(&self) -> bool {
        self.id == self.guild_id
    }
}
