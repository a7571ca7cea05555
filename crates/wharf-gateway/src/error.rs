//! Gateway errors

use thiserror::Error;

use crate::compression::InflateError;
use crate::protocol::CloseCode;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The socket closed without a reconnect or invalid-session signal
    #[error("Gateway connection closed (code: {code:?}): {reason}")]
    ConnectionClosed { code: Option<u16>, reason: String },

    /// The server asked for a reconnect; recovered by [`Gateway::run`]
    ///
    /// [`Gateway::run`]: crate::Gateway::run
    #[error("Gateway requested a reconnect (resume: {resume})")]
    ReconnectRequested { url: Option<String>, resume: bool },

    #[error("Gateway handshake failed: {0}")]
    Handshake(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Invalid gateway payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Decompression failed: {0}")]
    Decompress(#[from] InflateError),

    /// A handle was asked to send something a client may not send
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A handle was used after the gateway was dropped
    #[error("Gateway is not running")]
    NotRunning,
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionClosed { .. } => "CONNECTION_CLOSED",
            Self::ReconnectRequested { .. } => "RECONNECT_REQUESTED",
            Self::Handshake(_) => "HANDSHAKE_FAILED",
            Self::WebSocket(_) => "WEBSOCKET_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Decompress(_) => "DECOMPRESS_ERROR",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::NotRunning => "NOT_RUNNING",
        }
    }

    /// Close code, when the server sent one of the gateway's own codes
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::ConnectionClosed { code: Some(code), .. } => CloseCode::from_u16(*code),
            _ => None,
        }
    }

    /// Whether the session can be resumed on a new connection
    pub fn is_resumable(&self) -> bool {
        match self {
            Self::ReconnectRequested { resume, .. } => *resume,
            Self::ConnectionClosed { code, .. } => match (*code).and_then(CloseCode::from_u16) {
                Some(close) => close.can_resume(),
                // Transport-level closes keep the session
                None => true,
            },
            Self::WebSocket(_) => true,
            _ => false,
        }
    }

    /// Whether redialing can ever succeed
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Handshake(_) | Self::NotRunning => true,
            _ => self.close_code().is_some_and(CloseCode::is_fatal),
        }
    }
}
