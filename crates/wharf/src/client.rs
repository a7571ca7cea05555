//! The client: transport, cache, dispatcher and gateway wired together

use std::future::Future;
use std::sync::Arc;

use wharf_cache::InMemoryCache;
use wharf_common::ClientConfig;
use wharf_gateway::{
    Dispatcher, Event, Gateway, GatewayHandle, HandlerError, PresenceUpdatePayload,
};
use wharf_http::Http;

use crate::error::ClientError;

/// Bot client
///
/// ```no_run
/// # async fn demo() -> Result<(), wharf::ClientError> {
/// let mut client = wharf::Client::from_env()?;
/// client.subscribe("message_create", |event| async move {
///     if let Some(message) = event.message() {
///         tracing::info!(content = %message.content, "Message received");
///     }
///     Ok::<_, wharf::HandlerError>(())
/// });
/// client.start().await
/// # }
/// ```
pub struct Client {
    config: Arc<ClientConfig>,
    http: Http,
    cache: Arc<InMemoryCache>,
    dispatcher: Arc<Dispatcher>,
    gateway: Gateway,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Http::new(&config.token, config.http.clone())?;
        let cache = InMemoryCache::new_shared();
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&cache)));
        let gateway = Gateway::new(
            config.token.clone(),
            config.gateway.clone(),
            Arc::clone(&cache),
            Arc::clone(&dispatcher),
            Arc::new(http.clone()),
        );

        Ok(Self {
            config: Arc::new(config),
            http,
            cache,
            dispatcher,
            gateway,
        })
    }

    /// Build from `WHARF_*` environment variables
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Presence sent when identifying
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.gateway = self.gateway.with_presence(presence);
        self
    }

    /// Register an event handler; see [`Dispatcher::subscribe`]
    pub fn subscribe<F, Fut>(&self, event: &str, handler: F)
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.dispatcher.subscribe(event, handler);
    }

    /// Connect and run until closed or a non-recoverable error
    ///
    /// The gateway URL comes from the config if set, otherwise from
    /// `GET /gateway/bot`.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        let url = match &self.config.gateway.url {
            Some(url) => url.clone(),
            None => {
                let bot = self.http.get_gateway_bot().await?;
                if let Some(limit) = &bot.session_start_limit {
                    tracing::info!(
                        url = %bot.url,
                        remaining = limit.remaining,
                        total = limit.total,
                        "Gateway URL fetched"
                    );
                }
                bot.url
            }
        };

        self.gateway.run(&url).await?;
        tracing::info!("Client stopped");
        Ok(())
    }

    /// Handle for closing the connection or changing presence from elsewhere
    pub fn handle(&self) -> GatewayHandle {
        self.gateway.handle()
    }

    pub fn http(&self) -> &Http {
        &self.http
    }

    pub fn cache(&self) -> &Arc<InMemoryCache> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("http", &self.http)
            .field("gateway", &self.gateway)
            .finish()
    }
}
