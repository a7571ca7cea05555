//! Guild entity - a server and the root of its channels, roles and members

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Guild record
///
/// The guild's owned channels, roles and members live in the cache,
/// indexed by this guild's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub unavailable: bool,
}

impl Guild {
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            icon: None,
            banner: None,
            owner_id: None,
            member_count: None,
            unavailable: false,
        }
    }

    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == Some(user_id)
    }
}
