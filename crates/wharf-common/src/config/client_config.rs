//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file).

use std::env;
use std::time::Duration;

use wharf_core::Intents;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bot token, sent as `Authorization: Bot <token>`
    pub token: String,
    pub http: HttpConfig,
    pub gateway: GatewayConfig,
}

/// REST transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Versioned API root, without a trailing slash
    pub api_base: String,
    pub user_agent: String,
    /// Attempt ceiling for 429 and 5xx retries
    pub max_attempts: u32,
    /// 5xx backoff is `backoff_base + attempt * backoff_step`
    pub backoff_base: Duration,
    pub backoff_step: Duration,
    /// Process-wide request quota in front of the global throttle
    pub global_rate_per_sec: u32,
}

/// Gateway connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Overrides the URL returned by `GET /gateway/bot`
    pub url: Option<String>,
    pub api_version: u8,
    pub intents: Intents,
    /// Request zlib-stream transport compression
    pub compress: bool,
    /// Member count above which offline members are omitted from GUILD_CREATE
    pub large_threshold: u32,
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            max_attempts: default_max_attempts(),
            backoff_base: Duration::from_secs(1),
            backoff_step: Duration::from_secs(2),
            global_rate_per_sec: default_global_rate(),
        }
    }
}

impl HttpConfig {
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, step: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_step = step;
        self
    }

    /// Delay before retry number `attempt` (zero-based) after a 5xx
    ///
    /// Saturates instead of overflowing on huge configured steps.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_add(self.backoff_step.saturating_mul(attempt))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_version: 10,
            intents: Intents::default(),
            compress: true,
            large_threshold: default_large_threshold(),
            os: env::consts::OS.to_string(),
            browser: "wharf".to_string(),
            device: "wharf".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

// Default value functions
fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_user_agent() -> String {
    format!(
        "DiscordBot (https://github.com/wharf-rs/wharf, {})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_max_attempts() -> u32 {
    5
}

fn default_global_rate() -> u32 {
    50
}

fn default_large_threshold() -> u32 {
    250
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            http: HttpConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `WHARF_TOKEN` is missing or a value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("WHARF_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("WHARF_TOKEN"))?;

        let http = HttpConfig {
            api_base: lookup("WHARF_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(default_api_base),
            user_agent: default_user_agent(),
            max_attempts: parse_var(&lookup, "WHARF_HTTP_MAX_ATTEMPTS")?
                .unwrap_or_else(default_max_attempts),
            backoff_base: parse_secs(&lookup, "WHARF_HTTP_BACKOFF_BASE_SECS")?
                .unwrap_or(Duration::from_secs(1)),
            backoff_step: parse_secs(&lookup, "WHARF_HTTP_BACKOFF_STEP_SECS")?
                .unwrap_or(Duration::from_secs(2)),
            global_rate_per_sec: parse_var(&lookup, "WHARF_GLOBAL_RATE_PER_SEC")?
                .unwrap_or_else(default_global_rate),
        };

        if http.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "WHARF_HTTP_MAX_ATTEMPTS",
                "must be at least 1".to_string(),
            ));
        }
        if http.global_rate_per_sec == 0 {
            return Err(ConfigError::InvalidValue(
                "WHARF_GLOBAL_RATE_PER_SEC",
                "must be at least 1".to_string(),
            ));
        }

        let intents = match lookup("WHARF_INTENTS") {
            Some(raw) => Intents::parse(&raw)
                .map_err(|e| ConfigError::InvalidValue("WHARF_INTENTS", e.to_string()))?,
            None => Intents::default(),
        };

        let gateway = GatewayConfig {
            url: lookup("WHARF_GATEWAY_URL"),
            intents,
            compress: parse_var(&lookup, "WHARF_GATEWAY_COMPRESS")?.unwrap_or(true),
            large_threshold: parse_var(&lookup, "WHARF_LARGE_THRESHOLD")?
                .unwrap_or_else(default_large_threshold),
            ..GatewayConfig::default()
        };

        Ok(Self {
            token,
            http,
            gateway,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key, e.to_string()))
        })
        .transpose()
}

fn parse_secs<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_var::<f64, F>(lookup, key)?
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| ConfigError::InvalidValue(key, e.to_string()))
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
