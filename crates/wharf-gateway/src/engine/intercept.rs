//! Session and cache updates applied before an event is dispatched

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use wharf_cache::CacheResult;
use wharf_core::{Channel, Guild, MemberPayload, Snowflake};

use super::gateway::Context;
use crate::connection::ConnectionState;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{GatewayEventType, GuildDeleteEvent, GuildMemberRemoveEvent, ReadyEvent};
use crate::protocol::GatewayPayload;

impl Context {
    /// Apply structural events, then hand the event to the dispatcher
    pub(super) fn handle_dispatch(&self, payload: GatewayPayload) -> GatewayResult<()> {
        let Some(tag) = payload.t else {
            tracing::warn!(seq = ?payload.s, "Dispatch without an event name");
            return Ok(());
        };
        tracing::debug!(event = %tag, seq = ?payload.s, "Dispatch received");

        if let Some(event) = GatewayEventType::from_str(&tag) {
            if event.is_intercepted() {
                self.intercept(event, &payload.d)?;
            }
        }

        self.dispatcher.dispatch(&tag.to_ascii_lowercase(), payload.d);
        Ok(())
    }

    fn intercept(&self, event: GatewayEventType, data: &Value) -> GatewayResult<()> {
        match event {
            GatewayEventType::Ready => {
                let ready = parse_ready(data)?;
                self.shared
                    .session
                    .lock()
                    .establish(ready.session_id.clone(), ready.resume_gateway_url.clone());
                self.set_state(ConnectionState::Ready);
                tracing::info!(
                    session_id = %ready.session_id,
                    user = %ready.user.tag(),
                    guilds = ready.guilds.len(),
                    "Gateway ready"
                );
            }
            GatewayEventType::Resumed => {
                self.set_state(ConnectionState::Ready);
                tracing::info!("Session resumed");
            }
            GatewayEventType::GuildCreate => {
                if let Some(guild) = decode::<Guild>(event, data) {
                    let guild_id = guild.id;
                    let unavailable = guild.unavailable;
                    self.cache.add_guild(guild);
                    if !unavailable {
                        self.spawn_backfill(guild_id);
                    }
                }
            }
            GatewayEventType::GuildDelete => {
                if let Some(deleted) = decode::<GuildDeleteEvent>(event, data) {
                    report(event, self.cache.remove_guild(deleted.id));
                }
            }
            GatewayEventType::GuildMemberAdd => {
                if let Some(payload) = decode::<MemberPayload>(event, data) {
                    match payload.guild_id {
                        Some(guild_id) => report(event, self.cache.add_member(guild_id, &payload)),
                        None => tracing::warn!(event = %event, "Member event without guild_id"),
                    }
                }
            }
            GatewayEventType::GuildMemberRemove => {
                if let Some(removed) = decode::<GuildMemberRemoveEvent>(event, data) {
                    report(
                        event,
                        self.cache.remove_member(removed.guild_id, removed.user.id),
                    );
                }
            }
            GatewayEventType::ChannelDelete => {
                if let Some(channel) = decode::<Channel>(event, data) {
                    report(event, self.cache.remove_channel(channel.id));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Fetch the new guild's members, channels and roles in the background
    fn spawn_backfill(&self, guild_id: Snowflake) {
        let cache = Arc::clone(&self.cache);
        let source = Arc::clone(&self.source);

        tokio::spawn(async move {
            match cache.backfill_guild(source.as_ref(), guild_id).await {
                Ok(report) => tracing::info!(
                    guild_id = %guild_id,
                    members = report.members,
                    channels = report.channels,
                    roles = report.roles,
                    "Guild backfilled"
                ),
                Err(e) => tracing::error!(guild_id = %guild_id, error = %e, "Guild backfill failed"),
            }
        });
    }
}

/// READY is part of the handshake; a body that does not parse is fatal
fn parse_ready(data: &Value) -> GatewayResult<ReadyEvent> {
    ReadyEvent::deserialize(data)
        .map_err(|e| GatewayError::Handshake(format!("malformed READY: {e}")))
}

fn decode<T: DeserializeOwned>(event: GatewayEventType, data: &Value) -> Option<T> {
    match T::deserialize(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(event = %event, error = %e, "Malformed event body, cache not updated");
            None
        }
    }
}

/// Cache misses here mean events arrived out of order
fn report<T>(event: GatewayEventType, result: CacheResult<T>) {
    if let Err(e) = result {
        tracing::error!(event = %event, code = e.code(), error = %e, "Cache integrity violation");
    }
}
