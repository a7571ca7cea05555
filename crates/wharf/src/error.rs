//! Client errors

use thiserror::Error;
use wharf_common::ConfigError;
use wharf_gateway::GatewayError;
use wharf_http::HttpError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Http(e) => e.code(),
            Self::Gateway(e) => e.code(),
        }
    }

    /// Whether starting the client again can succeed without a config change
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Http(e) => matches!(
                e,
                HttpError::Request(_) | HttpError::RateLimitExhausted { .. }
            ),
            Self::Gateway(e) => !e.is_fatal(),
        }
    }
}
