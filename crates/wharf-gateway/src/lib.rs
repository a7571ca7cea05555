//! # wharf-gateway
//!
//! Client side of the real-time gateway.
//!
//! ## Features
//!
//! - **Handshake**: HELLO, then IDENTIFY or RESUME
//! - **Heartbeating**: jittered first beat, fixed period after, latency tracking
//! - **zlib-stream**: one inflate context per connection
//! - **Reconnects**: resume on request, fresh identify on a dead session
//! - **Dispatch**: structural events update the cache, every event reaches subscribers

pub mod compression;
pub mod connection;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod protocol;

pub use connection::{ConnectionState, SessionState};
pub use dispatch::{Dispatcher, Event, EventData, Handler, HandlerError};
pub use engine::{Gateway, GatewayHandle};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{
    Activity, ActivityType, CloseCode, GatewayPayload, OpCode, PresenceUpdatePayload,
    RequestGuildMembersPayload, Status,
};
