//! REST transport errors

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Result type for REST operations
pub type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection, TLS or body-read failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-retryable error status returned by the API
    #[error("{status} (error code: {code}): {message}")]
    Status {
        status: u16,
        code: u64,
        message: String,
    },

    /// 429 or 5xx responses kept coming until the attempt ceiling
    #[error("Gave up on {route} after {attempts} attempts (last status {status})")]
    RateLimitExhausted {
        route: String,
        attempts: u32,
        status: u16,
    },

    /// 429 issued by the edge proxy rather than the API's own accounting
    #[error("Blocked by edge rate limiter (retry after {retry_after:?})")]
    EdgeRateLimited { retry_after: Option<Duration> },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "REQUEST_FAILED",
            Self::Status { .. } => "HTTP_ERROR",
            Self::RateLimitExhausted { .. } => "RATE_LIMIT_EXHAUSTED",
            Self::EdgeRateLimited { .. } => "EDGE_RATE_LIMITED",
            Self::Decode(_) => "DECODE_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RateLimitExhausted { status, .. } => Some(*status),
            Self::EdgeRateLimited { .. } => Some(429),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Build from an error response body
    pub(crate) fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => {
                let mut message = parsed.message;
                if let Some(errors) = parsed.errors.as_ref().and_then(Value::as_object) {
                    let fields = flatten_errors(errors);
                    if !fields.is_empty() {
                        if !message.is_empty() {
                            message.push('\n');
                        }
                        message.push_str(&fields.join("\n"));
                    }
                }
                Self::Status {
                    status,
                    code: parsed.code,
                    message,
                }
            }
            Err(_) => Self::Status {
                status,
                code: 0,
                message: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Option<Value>,
}

/// Walk a nested validation error object down to its `_errors` leaves
///
/// Each leaf renders as `In <dotted.path>: msg, msg`.
pub(crate) fn flatten_errors(errors: &Map<String, Value>) -> Vec<String> {
    let mut out = Vec::new();
    walk(errors, "", &mut out);
    out
}

fn walk(node: &Map<String, Value>, path: &str, out: &mut Vec<String>) {
    for (key, value) in node {
        if key == "_errors" {
            out.push(render_leaf(path, value));
            continue;
        }

        let child = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };

        match value {
            Value::Object(inner) => walk(inner, &child, out),
            Value::String(s) => out.push(format!("In {child}: {s}")),
            other => out.push(format!("In {child}: {other}")),
        }
    }
}

fn render_leaf(path: &str, errors: &Value) -> String {
    let messages: Vec<&str> = errors
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if path.is_empty() {
        messages.join(", ")
    } else {
        format!("In {path}: {}", messages.join(", "))
    }
}
