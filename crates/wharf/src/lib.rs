//! # wharf
//!
//! One persistent gateway connection, a rate-limited REST transport and an
//! in-memory cache, wired into a single [`Client`].
//!
//! The parts are usable on their own through the re-exported crates.

pub mod client;
pub mod error;

pub use client::Client;
pub use error::ClientError;

pub use wharf_cache as cache;
pub use wharf_common as common;
pub use wharf_core as core;
pub use wharf_gateway as gateway;
pub use wharf_http as http;

pub use wharf_common::{init_tracing, ClientConfig, GatewayConfig, HttpConfig, TracingConfig};
pub use wharf_core::{
    Channel, Embed, Guild, Intents, Interaction, Member, Message, MessageFlags, Role, Snowflake,
    User,
};
pub use wharf_gateway::{Event, EventData, GatewayHandle, HandlerError};
