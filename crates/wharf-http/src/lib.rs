//! # wharf-http
//!
//! Rate-limited REST transport: per-route buckets discovered from response
//! headers, a global throttle, and retry on 429 and transient 5xx.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod ratelimit;
pub mod request;
pub mod route;

// Re-export commonly used types at crate root
pub use client::Http;
pub use endpoints::{
    CommandChoice, CommandOption, CreateCommand, CreateMessage, CreateRole, GatewayBot,
    SessionStartLimit, MEMBER_PAGE_LIMIT,
};
pub use error::{HttpError, HttpResult};
pub use ratelimit::{Bucket, GlobalThrottle, Migration, RateLimitHeaders, RateLimiter, Scope};
pub use request::{AttachmentFile, Request, RequestBody};
pub use route::Route;
