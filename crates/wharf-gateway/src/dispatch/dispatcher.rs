//! Event dispatcher
//!
//! Maps event names to handler lists and runs each handler as its own task.

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;
use wharf_cache::InMemoryCache;

use super::event::{Event, EventData};
use super::parsers::{parser_table, ParserTable};

/// Error a handler may return; it is logged and otherwise ignored
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Type-erased event handler
pub type Handler = Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Registry of event handlers
pub struct Dispatcher {
    handlers: DashMap<String, Vec<Handler>>,
    parsers: ParserTable,
    cache: Arc<InMemoryCache>,
}

impl Dispatcher {
    pub fn new(cache: Arc<InMemoryCache>) -> Self {
        Self {
            handlers: DashMap::new(),
            parsers: parser_table(),
            cache,
        }
    }

    /// Register a handler for an event name
    ///
    /// Names are case-insensitive (`"message_create"` and `"MESSAGE_CREATE"`
    /// are the same event). Handlers for one name run in registration order
    /// of spawning, but concurrently.
    pub fn subscribe<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        let name = name.to_ascii_lowercase();

        tracing::debug!(event = %name, "Handler subscribed");
        self.handlers.entry(name).or_default().push(handler);
    }

    /// Drop every handler for an event name, returning how many there were
    pub fn unsubscribe_all(&self, name: &str) -> usize {
        self.handlers
            .remove(&name.to_ascii_lowercase())
            .map_or(0, |(_, handlers)| handlers.len())
    }

    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .get(&name.to_ascii_lowercase())
            .map_or(0, |handlers| handlers.len())
    }

    /// Event names with at least one handler
    pub fn subscribed_events(&self) -> Vec<String> {
        self.handlers
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Schedule every handler for `name` and return immediately
    ///
    /// Returns the number of handlers spawned. An event nobody subscribed
    /// to is dropped without being parsed. Must be called from within a
    /// tokio runtime.
    pub fn dispatch(&self, name: &str, raw: Value) -> usize {
        let name = name.to_ascii_lowercase();

        // Clone the list so no map shard lock is held while spawning
        let handlers = match self.handlers.get(&name) {
            Some(handlers) if !handlers.is_empty() => handlers.clone(),
            _ => {
                tracing::trace!(event = %name, "No handlers for event");
                return 0;
            }
        };

        let event = Arc::new(self.build_event(name, raw));

        for handler in &handlers {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            tokio::spawn(async move {
                if let Err(e) = handler(Arc::clone(&event)).await {
                    tracing::error!(event = %event.name, error = %e, "Event handler failed");
                }
            });
        }

        handlers.len()
    }

    fn build_event(&self, name: String, raw: Value) -> Event {
        let data = match self.parsers.get(name.as_str()) {
            Some(parse) => parse(&self.cache, &raw).unwrap_or_else(|e| {
                tracing::debug!(event = %name, error = %e, "Event body did not parse, passing raw");
                EventData::Raw
            }),
            None => EventData::Raw,
        };

        Event { name, data, raw }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("events", &self.handlers.len())
            .field("parsers", &self.parsers.len())
            .finish()
    }
}
