//! The gateway engine
//!
//! Owns one socket at a time: handshake, heartbeats, frame decoding and
//! the reconnect policy.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use wharf_cache::InMemoryCache;
use wharf_common::GatewayConfig;
use wharf_core::GuildSource;

use super::handle::{Command, GatewayHandle, Shared};
use super::socket::{endpoint, read_frame, send_payload, Frame, WsSink, WsSource};
use crate::compression::Inflater;
use crate::connection::{ConnectionState, Heartbeater, SessionState};
use crate::dispatch::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{
    GatewayPayload, IdentifyPayload, IdentifyProperties, OpCode, PresenceUpdatePayload,
    ResumePayload,
};

/// Queued handle commands before senders wait
const COMMAND_BUFFER: usize = 32;

/// Close code that keeps the session resumable on the server side
const RESUME_CLOSE_CODE: u16 = 4000;

/// Everything the receive loop needs besides the socket
pub(super) struct Context {
    pub(super) token: String,
    pub(super) config: GatewayConfig,
    pub(super) presence: Option<PresenceUpdatePayload>,
    pub(super) cache: Arc<InMemoryCache>,
    pub(super) dispatcher: Arc<Dispatcher>,
    pub(super) source: Arc<dyn GuildSource>,
    pub(super) shared: Arc<Shared>,
}

/// Gateway connection engine
pub struct Gateway {
    ctx: Context,
    commands: mpsc::Receiver<Command>,
    handle: GatewayHandle,
}

impl Gateway {
    pub fn new(
        token: impl Into<String>,
        config: GatewayConfig,
        cache: Arc<InMemoryCache>,
        dispatcher: Arc<Dispatcher>,
        source: Arc<dyn GuildSource>,
    ) -> Self {
        let shared = Arc::new(Shared::default());
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);

        Self {
            ctx: Context {
                token: token.into(),
                config,
                presence: None,
                cache,
                dispatcher,
                source,
                shared: Arc::clone(&shared),
            },
            commands,
            handle: GatewayHandle::new(tx, shared),
        }
    }

    /// Presence sent with every IDENTIFY
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.ctx.presence = Some(presence);
        self
    }

    pub fn handle(&self) -> GatewayHandle {
        self.handle.clone()
    }

    pub fn cache(&self) -> &Arc<InMemoryCache> {
        &self.ctx.cache
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.ctx.dispatcher
    }

    pub fn state(&self) -> ConnectionState {
        *self.ctx.shared.state.lock()
    }

    pub fn session(&self) -> SessionState {
        self.ctx.shared.session.lock().clone()
    }

    /// Connect and keep reconnecting while the server asks for it
    ///
    /// Resumable signals redial the resume URL with the session kept. A
    /// non-resumable invalid session clears the session, waits a random
    /// 1-5 s and identifies again on `url`. Returns `Ok` after a
    /// [`GatewayHandle::close`], and any other error as is.
    pub async fn run(&mut self, url: &str) -> GatewayResult<()> {
        let mut target = url.to_string();

        loop {
            match self.connect(&target).await {
                Err(GatewayError::ReconnectRequested {
                    url: resume_url,
                    resume: true,
                }) => {
                    target = resume_url.unwrap_or_else(|| url.to_string());
                    tracing::info!(url = %target, "Reconnecting to resume session");
                }
                Err(GatewayError::ReconnectRequested { resume: false, .. }) => {
                    self.ctx.shared.session.lock().reset();
                    target = url.to_string();

                    let delay = reidentify_delay();
                    tracing::warn!(
                        delay_ms = delay.as_millis() as u64,
                        "Session not resumable, identifying again"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Open one connection and drive it until it ends
    ///
    /// Sends RESUME when the session allows it, IDENTIFY otherwise. The
    /// heartbeat task is stopped before this returns.
    pub async fn connect(&mut self, url: &str) -> GatewayResult<()> {
        let endpoint = endpoint(url, &self.ctx.config);
        self.ctx.set_state(ConnectionState::Connecting);
        tracing::info!(url = %endpoint, "Connecting to gateway");

        let (socket, _response) = match tokio_tungstenite::connect_async(endpoint.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                self.ctx.set_state(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };
        self.ctx.set_state(ConnectionState::AwaitingHello);

        let (mut sink, mut stream) = socket.split();
        let result = self
            .ctx
            .drive(&mut sink, &mut stream, &mut self.commands)
            .await;

        self.ctx.set_state(ConnectionState::Closing);
        if matches!(result, Err(GatewayError::ReconnectRequested { resume: true, .. })) {
            let frame = CloseFrame {
                code: WsCloseCode::from(RESUME_CLOSE_CODE),
                reason: "Reconnecting".into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                tracing::debug!(error = %e, "Close frame not sent");
            }
        }
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "Socket already closed");
        }
        self.ctx.set_state(ConnectionState::Disconnected);

        result
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.ctx.config)
            .field("state", &self.state())
            .finish()
    }
}

fn reidentify_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(1_000..=5_000))
}

impl Context {
    pub(super) fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.shared.state.lock(), state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    async fn drive(
        &self,
        sink: &mut WsSink,
        stream: &mut WsSource,
        commands: &mut mpsc::Receiver<Command>,
    ) -> GatewayResult<()> {
        let mut inflater = Inflater::new();

        let hello = match read_frame(stream, &mut inflater).await? {
            Frame::Payload(payload) => payload.as_hello().ok_or_else(|| {
                GatewayError::Handshake(format!("expected HELLO, got {payload}"))
            })?,
            Frame::Closed { code, reason } => {
                return Err(GatewayError::ConnectionClosed { code, reason })
            }
        };
        if hello.heartbeat_interval == 0 {
            return Err(GatewayError::Handshake("heartbeat interval is zero".into()));
        }

        let (tick_tx, mut ticks) = mpsc::channel(1);
        let _heartbeater =
            Heartbeater::spawn(Duration::from_millis(hello.heartbeat_interval), tick_tx);

        self.authenticate(sink).await?;

        loop {
            tokio::select! {
                frame = read_frame(stream, &mut inflater) => match frame? {
                    Frame::Payload(payload) => self.handle_payload(payload, sink).await?,
                    Frame::Closed { code, reason } => {
                        tracing::warn!(code = ?code, reason = %reason, "Gateway closed the connection");
                        return Err(GatewayError::ConnectionClosed { code, reason });
                    }
                },
                Some(()) = ticks.recv() => self.send_heartbeat(sink).await?,
                command = commands.recv() => match command {
                    Some(Command::Send(payload)) => send_payload(sink, &payload).await?,
                    Some(Command::Close) | None => {
                        tracing::info!("Closing gateway connection");
                        let frame = CloseFrame {
                            code: WsCloseCode::Normal,
                            reason: "".into(),
                        };
                        sink.send(Message::Close(Some(frame))).await?;
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn authenticate(&self, sink: &mut WsSink) -> GatewayResult<()> {
        let resume = {
            let mut session = self.shared.session.lock();
            match (&session.session_id, session.sequence) {
                (Some(session_id), Some(seq)) => Some(ResumePayload {
                    token: self.token.clone(),
                    session_id: session_id.clone(),
                    seq,
                }),
                _ => {
                    session.clear_sequence();
                    None
                }
            }
        };

        let frame = match resume {
            Some(payload) => {
                self.set_state(ConnectionState::Resuming);
                tracing::info!(session_id = %payload.session_id, seq = payload.seq, "Resuming session");
                GatewayPayload::resume(&payload)?
            }
            None => {
                self.set_state(ConnectionState::Identifying);
                tracing::info!(intents = self.config.intents.bits(), "Identifying");
                GatewayPayload::identify(&self.identify_payload())?
            }
        };

        send_payload(sink, &frame).await
    }

    fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload {
            token: self.token.clone(),
            intents: self.config.intents,
            properties: IdentifyProperties {
                os: self.config.os.clone(),
                browser: self.config.browser.clone(),
                device: self.config.device.clone(),
            },
            compress: false,
            large_threshold: self.config.large_threshold,
            presence: self.presence.clone(),
        }
    }

    async fn send_heartbeat(&self, sink: &mut WsSink) -> GatewayResult<()> {
        let sequence = self.shared.session.lock().sequence;
        {
            let mut latency = self.shared.latency.lock();
            if latency.awaiting_ack() {
                tracing::warn!("Previous heartbeat was not acknowledged");
            }
            latency.record_send(Instant::now());
        }

        tracing::debug!(seq = ?sequence, "Sending heartbeat");
        send_payload(sink, &GatewayPayload::heartbeat(sequence)).await
    }

    async fn handle_payload(&self, payload: GatewayPayload, sink: &mut WsSink) -> GatewayResult<()> {
        if let Some(seq) = payload.s {
            self.shared.session.lock().observe(seq);
        }

        match payload.op {
            OpCode::Dispatch => self.handle_dispatch(payload),
            OpCode::Heartbeat => {
                tracing::debug!("Server requested a heartbeat");
                self.send_heartbeat(sink).await
            }
            OpCode::HeartbeatAck => {
                let rtt = self.shared.latency.lock().record_ack(Instant::now());
                if let Some(rtt) = rtt {
                    tracing::debug!(latency_ms = rtt.as_millis() as u64, "Heartbeat acknowledged");
                }
                Ok(())
            }
            OpCode::Reconnect => {
                tracing::info!("Server requested a reconnect");
                Err(self.reconnect(true))
            }
            OpCode::InvalidSession => {
                let resumable = payload.as_invalid_session().unwrap_or(false);
                tracing::warn!(resumable, "Session invalidated");
                if !resumable {
                    self.shared.session.lock().reset();
                }
                Err(self.reconnect(resumable))
            }
            OpCode::Hello => {
                tracing::warn!("Unexpected HELLO on an established connection");
                Ok(())
            }
            op => {
                tracing::debug!(op = %op, "Ignoring client-only op");
                Ok(())
            }
        }
    }

    fn reconnect(&self, resume: bool) -> GatewayError {
        let session = self.shared.session.lock();
        let resume = resume && session.can_resume();
        GatewayError::ReconnectRequested {
            url: if resume { session.resume_url.clone() } else { None },
            resume,
        }
    }
}
