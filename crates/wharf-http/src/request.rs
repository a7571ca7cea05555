//! Request bodies
//!
//! A request carries exactly one body kind; the enum makes a JSON body
//! alongside a multipart body unrepresentable.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::error::HttpResult;
use crate::route::Route;

/// Header carrying a moderation action's reason into the audit log
pub const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Everything except unreserved characters, `/` and space is escaped
const REASON_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/')
    .remove(b' ');

/// Percent-encode an audit log reason for use as a header value
pub fn encode_reason(reason: &str) -> String {
    utf8_percent_encode(reason, REASON_ESCAPE).to_string()
}

/// A file sent as a multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl AttachmentFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// `payload_json` plus `files[n]` parts
    Multipart {
        payload_json: Value,
        files: Vec<AttachmentFile>,
    },
}

impl RequestBody {
    /// Multipart when files are present, JSON otherwise
    pub fn with_files(payload: Value, files: Vec<AttachmentFile>) -> Self {
        if files.is_empty() {
            Self::Json(payload)
        } else {
            Self::Multipart {
                payload_json: payload,
                files,
            }
        }
    }

    /// Attach the body to a request builder
    ///
    /// Called once per attempt since a multipart form cannot be replayed.
    pub(crate) fn apply(&self, builder: RequestBuilder) -> HttpResult<RequestBuilder> {
        Ok(match self {
            Self::Empty => builder,
            Self::Json(value) => builder.json(value),
            Self::Multipart {
                payload_json,
                files,
            } => {
                let mut form = Form::new().part(
                    "payload_json",
                    Part::text(payload_json.to_string()).mime_str("application/json")?,
                );
                for (index, file) in files.iter().enumerate() {
                    form = form.part(
                        format!("files[{index}]"),
                        Part::bytes(file.data.clone()).file_name(file.filename.clone()),
                    );
                }
                builder.multipart(form)
            }
        })
    }
}

/// A route plus its query string and body
#[derive(Debug, Clone)]
pub struct Request {
    pub route: Route,
    pub query: Vec<(&'static str, String)>,
    pub body: RequestBody,
    /// Sent as `X-Audit-Log-Reason`
    pub reason: Option<String>,
}

impl Request {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            query: Vec::new(),
            body: RequestBody::Empty,
            reason: None,
        }
    }

    /// Attach an audit log reason; `None` leaves the request unchanged
    pub fn reason(mut self, reason: Option<&str>) -> Self {
        if let Some(reason) = reason {
            self.reason = Some(reason.to_string());
        }
        self
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn json(self, value: Value) -> Self {
        self.body(RequestBody::Json(value))
    }
}

impl From<Route> for Request {
    fn from(route: Route) -> Self {
        Self::new(route)
    }
}
