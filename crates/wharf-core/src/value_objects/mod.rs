//! Value objects - immutable types that represent protocol concepts

mod intents;
mod message_flags;
mod snowflake;

pub use intents::Intents;
pub use message_flags::MessageFlags;
pub use snowflake::{Snowflake, SnowflakeParseError};
