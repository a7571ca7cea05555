//! Event tag to parser table
//!
//! Built once when the dispatcher is created.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use wharf_cache::InMemoryCache;
use wharf_core::{Channel, Guild, Interaction, Member, MemberPayload, Message, Snowflake};

use super::event::EventData;
use crate::events::{
    GatewayEventType, GuildDeleteEvent, GuildMemberRemoveEvent, GuildRoleDeleteEvent,
    GuildRoleEvent, MessageDeleteEvent, ReadyEvent,
};

pub(crate) type ParseResult = Result<EventData, serde_json::Error>;

/// Builds the typed view of one event body
pub(crate) type Parser = fn(&InMemoryCache, &Value) -> ParseResult;

pub(crate) type ParserTable = HashMap<&'static str, Parser>;

pub(crate) fn parser_table() -> ParserTable {
    use GatewayEventType as E;

    let entries: [(GatewayEventType, Parser); 18] = [
        (E::Ready, parse_ready),
        (E::Resumed, parse_empty),
        (E::GuildCreate, parse_cached_guild),
        (E::GuildUpdate, parse_guild),
        (E::GuildDelete, parse_guild_delete),
        (E::ChannelCreate, parse_cached_channel),
        (E::ChannelUpdate, parse_channel),
        (E::ChannelDelete, parse_channel),
        (E::GuildMemberAdd, parse_cached_member),
        (E::GuildMemberUpdate, parse_member),
        (E::GuildMemberRemove, parse_member_remove),
        (E::GuildRoleCreate, parse_role),
        (E::GuildRoleUpdate, parse_role),
        (E::GuildRoleDelete, parse_role_delete),
        (E::MessageCreate, parse_message),
        (E::MessageUpdate, parse_message),
        (E::MessageDelete, parse_message_delete),
        (E::InteractionCreate, parse_interaction),
    ];

    entries
        .into_iter()
        .map(|(event, parser)| (event.handler_name(), parser))
        .collect()
}

fn parse_empty(_: &InMemoryCache, _: &Value) -> ParseResult {
    Ok(EventData::None)
}

fn parse_ready(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::Ready(Box::new(ReadyEvent::deserialize(data)?)))
}

fn parse_guild(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::Guild(Arc::new(Guild::deserialize(data)?)))
}

fn parse_cached_guild(cache: &InMemoryCache, data: &Value) -> ParseResult {
    let guild = Guild::deserialize(data)?;
    Ok(EventData::Guild(
        cache.guild(guild.id).unwrap_or_else(|| Arc::new(guild)),
    ))
}

fn parse_guild_delete(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::GuildDelete(GuildDeleteEvent::deserialize(data)?))
}

fn parse_channel(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::Channel(Arc::new(Channel::deserialize(data)?)))
}

fn parse_cached_channel(cache: &InMemoryCache, data: &Value) -> ParseResult {
    let channel = Channel::deserialize(data)?;
    Ok(EventData::Channel(
        cache.channel(channel.id).unwrap_or_else(|| Arc::new(channel)),
    ))
}

/// Member events carry `guild_id` inside the member body
fn member_parts(data: &Value) -> Result<(Snowflake, MemberPayload), serde_json::Error> {
    let payload = MemberPayload::deserialize(data)?;
    let guild_id = payload
        .guild_id
        .ok_or_else(|| serde::de::Error::missing_field("guild_id"))?;
    Ok((guild_id, payload))
}

fn parse_member(_: &InMemoryCache, data: &Value) -> ParseResult {
    let (guild_id, payload) = member_parts(data)?;
    Ok(EventData::Member(Arc::new(Member::from_payload(
        guild_id, &payload,
    ))))
}

fn parse_cached_member(cache: &InMemoryCache, data: &Value) -> ParseResult {
    let (guild_id, payload) = member_parts(data)?;
    let member = cache
        .member(guild_id, payload.user.id)
        .unwrap_or_else(|| Arc::new(Member::from_payload(guild_id, &payload)));
    Ok(EventData::Member(member))
}

fn parse_member_remove(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::MemberRemove(GuildMemberRemoveEvent::deserialize(
        data,
    )?))
}

fn parse_role(_: &InMemoryCache, data: &Value) -> ParseResult {
    let mut event = GuildRoleEvent::deserialize(data)?;
    event.role.guild_id = event.guild_id;
    Ok(EventData::Role(event))
}

fn parse_role_delete(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::RoleDelete(GuildRoleDeleteEvent::deserialize(data)?))
}

fn parse_message(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::Message(Box::new(Message::deserialize(data)?)))
}

fn parse_message_delete(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::MessageDelete(MessageDeleteEvent::deserialize(
        data,
    )?))
}

fn parse_interaction(_: &InMemoryCache, data: &Value) -> ParseResult {
    Ok(EventData::Interaction(Box::new(Interaction::deserialize(
        data,
    )?)))
}
