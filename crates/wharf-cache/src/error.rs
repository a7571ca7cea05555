//! Backfill errors

use thiserror::Error;
use wharf_core::{CacheError, Snowflake, SourceError};

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Failed to fetch dependents of guild {guild_id}: {source}")]
    Source {
        guild_id: Snowflake,
        #[source]
        source: SourceError,
    },

    /// The guild left the cache while its dependents were being fetched
    #[error(transparent)]
    Cache(#[from] CacheError),
}
