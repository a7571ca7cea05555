//! Gateway protocol definitions
//!
//! Op codes, close codes, the frame envelope and typed frame bodies.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use messages::GatewayPayload;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, ActivityType, HelloPayload, IdentifyPayload, IdentifyProperties,
    PresenceUpdatePayload, RequestGuildMembersPayload, ResumePayload, Status,
};
