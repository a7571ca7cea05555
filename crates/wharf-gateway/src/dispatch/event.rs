//! Events handed to subscribers

use std::sync::Arc;

use serde_json::Value;
use wharf_core::{Channel, Guild, Interaction, Member, Message};

use crate::events::{
    GuildDeleteEvent, GuildMemberRemoveEvent, GuildRoleDeleteEvent, GuildRoleEvent,
    MessageDeleteEvent, ReadyEvent,
};

/// A dispatched gateway event
#[derive(Debug, Clone)]
pub struct Event {
    /// Lower-cased event name, e.g. `guild_create`
    pub name: String,
    pub data: EventData,
    /// The untouched `d` field
    pub raw: Value,
}

/// Typed view of an event body
///
/// Guilds, channels and members are the cached `Arc` when one exists.
#[derive(Debug, Clone)]
pub enum EventData {
    /// The event carries no content
    None,
    Ready(Box<ReadyEvent>),
    Guild(Arc<Guild>),
    GuildDelete(GuildDeleteEvent),
    Channel(Arc<Channel>),
    Member(Arc<Member>),
    MemberRemove(GuildMemberRemoveEvent),
    Role(GuildRoleEvent),
    RoleDelete(GuildRoleDeleteEvent),
    Message(Box<Message>),
    MessageDelete(MessageDeleteEvent),
    Interaction(Box<Interaction>),
    /// No typed parser for this event, or the body did not parse; use `raw`
    Raw,
}

impl Event {
    pub fn guild(&self) -> Option<&Arc<Guild>> {
        match &self.data {
            EventData::Guild(guild) => Some(guild),
            _ => None,
        }
    }

    pub fn channel(&self) -> Option<&Arc<Channel>> {
        match &self.data {
            EventData::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    pub fn member(&self) -> Option<&Arc<Member>> {
        match &self.data {
            EventData::Member(member) => Some(member),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match &self.data {
            EventData::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        match &self.data {
            EventData::Interaction(interaction) => Some(interaction),
            _ => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.data, EventData::Raw)
    }
}
