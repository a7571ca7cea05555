//! REST routes and their rate-limit bucket keys

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;

/// Path parameters that define a bucket's identity
const MAJOR_PARAMETERS: [&str; 4] = ["guild_id", "channel_id", "webhook_id", "webhook_token"];

/// Parameter values are single path segments: only unreserved characters pass
const SEGMENT_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// An API route: method, path template and parameter values
///
/// Templates use `{name}` placeholders, e.g. `/guilds/{guild_id}/members/{user_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    template: &'static str,
    params: Vec<(&'static str, String)>,
}

impl Route {
    pub fn new(method: Method, template: &'static str) -> Self {
        Self {
            method,
            template,
            params: Vec::new(),
        }
    }

    pub fn get(template: &'static str) -> Self {
        Self::new(Method::GET, template)
    }

    pub fn post(template: &'static str) -> Self {
        Self::new(Method::POST, template)
    }

    pub fn put(template: &'static str) -> Self {
        Self::new(Method::PUT, template)
    }

    pub fn patch(template: &'static str) -> Self {
        Self::new(Method::PATCH, template)
    }

    pub fn delete(template: &'static str) -> Self {
        Self::new(Method::DELETE, template)
    }

    /// Bind a path parameter
    pub fn param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Concrete request path with every parameter substituted and escaped
    pub fn path(&self) -> String {
        self.render(|_| true)
    }

    /// `METHOD:path` with only major parameters substituted and the rest blanked
    ///
    /// Structurally identical endpoints share a key until the server
    /// assigns them a canonical bucket.
    pub fn bucket_key(&self) -> String {
        format!(
            "{}:{}",
            self.method,
            self.render(|name| MAJOR_PARAMETERS.contains(&name))
        )
    }

    fn render(&self, include: impl Fn(&str) -> bool) -> String {
        let mut out = String::with_capacity(self.template.len() + 32);
        let mut rest = self.template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start..].find('}') else {
                // Unterminated placeholder, keep it literally
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &rest[start + 1..start + len];
            if include(name) {
                if let Some((_, value)) = self.params.iter().find(|(n, _)| *n == name) {
                    out.extend(utf8_percent_encode(value, SEGMENT_ESCAPE));
                }
            }
            rest = &rest[start + len + 1..];
        }

        out.push_str(rest);
        out
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}
