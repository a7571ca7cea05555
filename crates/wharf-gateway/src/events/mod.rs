//! Gateway events
//!
//! Dispatch event names and the payloads that are not plain entity records.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{
    GuildDeleteEvent, GuildMemberRemoveEvent, GuildRoleDeleteEvent, GuildRoleEvent,
    MessageDeleteEvent, ReadyEvent, UnavailableGuild,
};
