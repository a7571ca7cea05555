//! Handle for talking to a running gateway

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::{ConnectionState, Latency, SessionState};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayPayload, PresenceUpdatePayload, RequestGuildMembersPayload};

/// Requests from handles to the receive loop
#[derive(Debug)]
pub(crate) enum Command {
    Send(GatewayPayload),
    Close,
}

/// State the receive loop publishes for handles to read
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub state: Mutex<ConnectionState>,
    pub session: Mutex<SessionState>,
    pub latency: Mutex<Latency>,
}

/// Cloneable handle to a [`Gateway`](crate::Gateway)
///
/// Commands queue while the gateway is between connections and go out on
/// the next one.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl GatewayHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>, shared: Arc<Shared>) -> Self {
        Self { commands, shared }
    }

    /// Queue a presence, voice state or member request frame
    pub async fn send(&self, payload: GatewayPayload) -> GatewayResult<()> {
        if !payload.op.is_user_command() {
            return Err(GatewayError::InvalidCommand(format!(
                "op {} is managed by the connection",
                payload.op
            )));
        }
        self.command(Command::Send(payload)).await
    }

    pub async fn update_presence(&self, presence: &PresenceUpdatePayload) -> GatewayResult<()> {
        self.send(GatewayPayload::presence_update(presence)?).await
    }

    /// Ask for a guild's members; they arrive as GUILD_MEMBERS_CHUNK dispatches
    pub async fn request_guild_members(
        &self,
        request: &RequestGuildMembersPayload,
    ) -> GatewayResult<()> {
        self.send(GatewayPayload::request_guild_members(request)?).await
    }

    /// Close the connection; `Gateway::run` returns `Ok` afterwards
    pub async fn close(&self) -> GatewayResult<()> {
        self.command(Command::Close).await
    }

    /// Last measured heartbeat round trip
    pub fn latency(&self) -> Option<Duration> {
        self.shared.latency.lock().recent()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.lock()
    }

    pub fn session(&self) -> SessionState {
        self.shared.session.lock().clone()
    }

    async fn command(&self, command: Command) -> GatewayResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GatewayError::NotRunning)
    }
}
