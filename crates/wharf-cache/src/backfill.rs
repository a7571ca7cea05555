//! Guild backfill - bulk population of a guild's dependents over REST

use wharf_core::{GuildSource, Snowflake};

use crate::error::BackfillError;
use crate::memory::InMemoryCache;

/// How many of each dependent a backfill inserted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub members: usize,
    pub channels: usize,
    pub roles: usize,
}

impl InMemoryCache {
    /// Fetch the guild's members, channels and roles and insert each one
    ///
    /// The three lists are fetched concurrently. Inserts go through the
    /// normal add path, so anything already cached is kept as is.
    pub async fn backfill_guild(
        &self,
        source: &dyn GuildSource,
        guild_id: Snowflake,
    ) -> Result<BackfillReport, BackfillError> {
        let wrap = |err| BackfillError::Source {
            guild_id,
            source: err,
        };

        let (members, channels, roles) = tokio::try_join!(
            async { source.guild_members(guild_id).await.map_err(wrap) },
            async { source.guild_channels(guild_id).await.map_err(wrap) },
            async { source.guild_roles(guild_id).await.map_err(wrap) },
        )?;

        let report = BackfillReport {
            members: members.len(),
            channels: channels.len(),
            roles: roles.len(),
        };

        for role in roles {
            self.add_role(guild_id, role)?;
        }
        for channel in channels {
            self.add_guild_channel(guild_id, channel)?;
        }
        for member in &members {
            self.add_member(guild_id, member)?;
        }

        tracing::debug!(
            guild_id = %guild_id,
            members = report.members,
            channels = report.channels,
            roles = report.roles,
            "Guild backfill complete"
        );
        Ok(report)
    }
}
