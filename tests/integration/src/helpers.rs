//! Mock servers and polling helpers

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::RawQuery;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use flate2::{Compress, Compression, FlushCompress};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wharf_common::{ClientConfig, GatewayConfig, HttpConfig};
use wharf_http::Http;

/// How long a test waits for the client to do something
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// An axum app served on an ephemeral port
pub struct MockServer {
    pub addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(app: Router) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }
}

/// Scripted gateway: every upgraded socket is handed to the test
pub struct MockGateway {
    server: MockServer,
    sockets: mpsc::UnboundedReceiver<GatewaySocket>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let (tx, sockets) = mpsc::unbounded_channel();

        let app = Router::new().route(
            "/",
            get(move |ws: WebSocketUpgrade, RawQuery(query): RawQuery| {
                let tx = tx.clone();
                async move {
                    ws.on_upgrade(move |socket| async move {
                        let _ = tx.send(GatewaySocket::new(socket, query));
                    })
                    .into_response()
                }
            }),
        );

        Ok(Self {
            server: MockServer::start(app).await?,
            sockets,
        })
    }

    pub fn url(&self) -> String {
        self.server.ws_url()
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<GatewaySocket> {
        tokio::time::timeout(STEP_TIMEOUT, self.sockets.recv())
            .await
            .context("client did not connect")?
            .ok_or_else(|| anyhow!("gateway server stopped"))
    }
}

/// Server side of one gateway connection
pub struct GatewaySocket {
    socket: WebSocket,
    pub query: String,
    deflate: Option<Compress>,
}

impl GatewaySocket {
    fn new(socket: WebSocket, query: Option<String>) -> Self {
        let query = query.unwrap_or_default();
        let deflate = query
            .contains("compress=zlib-stream")
            .then(|| Compress::new(Compression::default(), true));

        Self {
            socket,
            query,
            deflate,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.deflate.is_some()
    }

    /// Send a frame; compressed frames are split across two socket writes
    pub async fn send(&mut self, frame: Value) -> Result<()> {
        let text = serde_json::to_string(&frame)?;

        match self.deflate.as_mut() {
            Some(context) => {
                let mut out = Vec::with_capacity(text.len() + 1024);
                context.compress_vec(text.as_bytes(), &mut out, FlushCompress::Sync)?;
                let tail = out.split_off(out.len() / 2);
                self.socket.send(Message::Binary(out)).await?;
                self.socket.send(Message::Binary(tail)).await?;
            }
            None => self.socket.send(Message::Text(text)).await?,
        }
        Ok(())
    }

    pub async fn hello(&mut self, heartbeat_interval: u64) -> Result<()> {
        self.send(json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}}))
            .await
    }

    pub async fn dispatch(&mut self, seq: u64, event: &str, data: Value) -> Result<()> {
        self.send(json!({"op": 0, "s": seq, "t": event, "d": data}))
            .await
    }

    pub async fn op(&mut self, op: u8, data: Value) -> Result<()> {
        self.send(json!({"op": op, "d": data})).await
    }

    /// Next frame from the client
    pub async fn recv(&mut self) -> Result<Value> {
        loop {
            let message = tokio::time::timeout(STEP_TIMEOUT, self.socket.recv())
                .await
                .context("client sent nothing")?
                .ok_or_else(|| anyhow!("client disconnected"))??;

            match message {
                Message::Text(text) => return Ok(serde_json::from_str(&text)?),
                Message::Close(frame) => {
                    bail!("client closed the socket: {:?}", frame.map(|f| f.code))
                }
                _ => {}
            }
        }
    }

    /// Next frame with the given op, skipping anything else (e.g. heartbeats)
    pub async fn recv_op(&mut self, op: u64) -> Result<Value> {
        loop {
            let frame = self.recv().await?;
            if frame["op"] == op {
                return Ok(frame);
            }
        }
    }

    /// Wait until the client closes, returning its close code
    pub async fn closed(&mut self) -> Result<Option<u16>> {
        loop {
            let message = tokio::time::timeout(STEP_TIMEOUT, self.socket.recv())
                .await
                .context("client kept the socket open")?;

            match message {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| f.code)),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }

    pub async fn close(mut self, code: u16, reason: &'static str) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await?;
        Ok(())
    }
}

/// Poll until `check` passes
pub async fn eventually<F>(what: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            bail!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// REST settings with fast backoff, pointed at a mock server
pub fn http_config(base_url: &str) -> HttpConfig {
    HttpConfig::default()
        .with_api_base(base_url)
        .with_max_attempts(3)
        .with_backoff(Duration::from_millis(10), Duration::from_millis(10))
}

pub fn http_client(base_url: &str) -> Result<Http> {
    Ok(Http::new(TOKEN, http_config(base_url))?)
}

pub const TOKEN: &str = "test-token";

/// Client config pointed at the mock servers
pub fn client_config(api_base: &str, gateway_url: &str, compress: bool) -> ClientConfig {
    let mut config = ClientConfig::new(TOKEN);
    config.http = http_config(api_base);
    config.gateway = GatewayConfig::default()
        .with_url(gateway_url)
        .with_compress(compress);
    config
}
