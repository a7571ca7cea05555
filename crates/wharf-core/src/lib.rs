//! # wharf-core
//!
//! Entity records, value objects, errors and the traits the other crates
//! meet at. This crate has no dependency on any transport.

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    ApplicationCommand, Attachment, Channel, ChannelType, CommandData, CommandDataOption,
    CommandOptionType, Embed, EmbedField, Guild, Interaction, InteractionType, Member,
    MemberPayload, Message, Role, User,
};
pub use error::CacheError;
pub use traits::{GuildSource, SourceError, SourceResult};
pub use value_objects::{Intents, MessageFlags, Snowflake, SnowflakeParseError};
