//! Connection lifecycle
//!
//! State, resumable session data and heartbeating for one gateway socket.

mod heartbeat;
mod session;
mod state;

pub use heartbeat::{Heartbeater, Latency};
pub use session::SessionState;
pub use state::ConnectionState;
