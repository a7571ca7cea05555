//! Guild source trait (port) - where cache backfill fetches a guild's
//! dependents from
//!
//! The REST client implements this; tests substitute an in-memory source.

use async_trait::async_trait;

use crate::entities::{Channel, MemberPayload, Role};
use crate::value_objects::Snowflake;

/// Error type returned by a guild source
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for guild source operations
pub type SourceResult<T> = Result<T, SourceError>;

#[async_trait]
pub trait GuildSource: Send + Sync {
    /// Fetch the guild's member list
    async fn guild_members(&self, guild_id: Snowflake) -> SourceResult<Vec<MemberPayload>>;

    /// Fetch the guild's channel list
    async fn guild_channels(&self, guild_id: Snowflake) -> SourceResult<Vec<Channel>>;

    /// Fetch the guild's role list
    async fn guild_roles(&self, guild_id: Snowflake) -> SourceResult<Vec<Role>>;
}
