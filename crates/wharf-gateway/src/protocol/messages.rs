//! Gateway frame envelope
//!
//! Every frame on the socket is `{op, d, s, t}`.

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway frame envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: OpCode,

    /// Event data; `null` for frames without a body
    #[serde(default)]
    pub d: Value,

    /// Sequence number, only set on dispatches
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name, only set on dispatches
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    fn outgoing(op: OpCode, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    fn typed<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::outgoing(op, serde_json::to_value(payload)?))
    }

    // === Client frames ===

    /// Heartbeat carrying the last sequence seen, or `null` before any dispatch
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::outgoing(
            OpCode::Heartbeat,
            last_sequence.map_or(Value::Null, Value::from),
        )
    }

    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Self::typed(OpCode::Identify, payload)
    }

    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Self::typed(OpCode::Resume, payload)
    }

    pub fn presence_update(payload: &PresenceUpdatePayload) -> Result<Self, serde_json::Error> {
        Self::typed(OpCode::PresenceUpdate, payload)
    }

    pub fn request_guild_members(
        payload: &RequestGuildMembersPayload,
    ) -> Result<Self, serde_json::Error> {
        Self::typed(OpCode::RequestGuildMembers, payload)
    }

    // === Server frames ===

    /// Parse the Hello body (op=10)
    pub fn as_hello(&self) -> Option<HelloPayload> {
        if self.op != OpCode::Hello {
            return None;
        }
        HelloPayload::deserialize(&self.d).ok()
    }

    /// Whether an Invalid Session (op=9) may be resumed
    pub fn as_invalid_session(&self) -> Option<bool> {
        if self.op != OpCode::InvalidSession {
            return None;
        }
        Some(self.d.as_bool().unwrap_or(false))
    }

    // === Utilities ===

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl std::fmt::Display for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayPayload(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayPayload(op={})", self.op)
        }
    }
}
