//! Socket plumbing: endpoint URLs and frame reads

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use wharf_common::GatewayConfig;

use crate::compression::Inflater;
use crate::error::GatewayResult;
use crate::protocol::GatewayPayload;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// One complete read from the socket
#[derive(Debug)]
pub(crate) enum Frame {
    Payload(GatewayPayload),
    Closed { code: Option<u16>, reason: String },
}

/// Add the version, encoding and compression query to a gateway URL
pub(crate) fn endpoint(base: &str, config: &GatewayConfig) -> String {
    let base = base.split('?').next().unwrap_or(base).trim_end_matches('/');
    let mut url = format!("{base}/?v={}&encoding=json", config.api_version);
    if config.compress {
        url.push_str("&compress=zlib-stream");
    }
    url
}

/// Read until one full payload (or a close) is available
///
/// Cancel safe: partial compressed chunks live in the inflater, not in
/// this future.
pub(crate) async fn read_frame(
    stream: &mut WsSource,
    inflater: &mut Inflater,
) -> GatewayResult<Frame> {
    loop {
        let message = match stream.next().await {
            Some(message) => message?,
            None => {
                return Ok(Frame::Closed {
                    code: None,
                    reason: "stream ended".to_string(),
                })
            }
        };

        match message {
            Message::Text(text) => {
                return Ok(Frame::Payload(GatewayPayload::from_slice(text.as_bytes())?));
            }
            Message::Binary(chunk) => {
                if let Some(bytes) = inflater.push(&chunk)? {
                    return Ok(Frame::Payload(GatewayPayload::from_slice(&bytes)?));
                }
            }
            Message::Close(frame) => {
                let (code, reason) = frame.map_or((None, String::new()), |f| {
                    (Some(u16::from(f.code)), f.reason.into_owned())
                });
                return Ok(Frame::Closed { code, reason });
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                tracing::trace!("Control frame received");
            }
        }
    }
}

pub(crate) async fn send_payload(sink: &mut WsSink, payload: &GatewayPayload) -> GatewayResult<()> {
    tracing::trace!(op = %payload.op, "Sending frame");
    sink.send(Message::Text(payload.to_json()?)).await?;
    Ok(())
}
