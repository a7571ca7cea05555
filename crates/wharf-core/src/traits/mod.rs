mod guild_source;

pub use guild_source::{GuildSource, SourceError, SourceResult};
