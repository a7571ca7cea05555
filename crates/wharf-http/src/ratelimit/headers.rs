//! Rate-limit response headers

use std::time::Duration;

use reqwest::header::HeaderMap;

/// Which limit a 429 was counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Per-route limit for this bot
    User,
    /// Process-wide limit for this bot
    Global,
    /// Per-resource limit shared with other bots
    Shared,
}

impl Scope {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "global" => Some(Self::Global),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Parsed `X-RateLimit-*` headers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    /// Server-assigned canonical bucket hash
    pub bucket: Option<String>,
    pub global: bool,
    pub scope: Option<Scope>,
    pub retry_after: Option<Duration>,
    /// Whether the response passed through the API's own proxy
    pub via: bool,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let secs = |name: &str| {
            text(name)
                .and_then(|v| v.parse::<f64>().ok())
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
        };

        Self {
            limit: text("x-ratelimit-limit").and_then(|v| v.parse().ok()),
            remaining: text("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_after: secs("x-ratelimit-reset-after"),
            bucket: text("x-ratelimit-bucket").map(str::to_string),
            global: text("x-ratelimit-global").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: text("x-ratelimit-scope").and_then(Scope::parse),
            retry_after: secs("retry-after"),
            via: headers.contains_key("via"),
        }
    }

    /// True when a 429 applies to every route
    pub fn is_global(&self) -> bool {
        self.global || self.scope == Some(Scope::Global)
    }
}
