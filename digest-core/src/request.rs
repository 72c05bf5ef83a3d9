//! Inbound request view used by the gate
//!
//! The gate only ever looks at the path, the `authorization` header and the
//! `cookie` header, so a request is reduced to those three strings before
//! evaluation. This keeps the core independent of any HTTP framework.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying a bearer credential
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Header carrying request cookies
pub const COOKIE_HEADER: &str = "cookie";

/// The parts of an inbound request the gate decides on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRequest {
    /// Request path, without query string
    pub path: String,
    /// Raw `authorization` header value
    pub authorization: Option<String>,
    /// Raw `cookie` header value (multiple headers joined with `"; "`)
    pub cookie: Option<String>,
    /// Request ID for tracing
    pub request_id: Arc<str>,
}

impl GateRequest {
    /// Create a request for a path with no credentials
    pub fn new(path: impl Into<String>) -> Self {
        GateRequest {
            path: path.into(),
            authorization: None,
            cookie: None,
            request_id: Arc::from(generate_request_id().into_boxed_str()),
        }
    }

    /// Build a request from a path and raw header pairs.
    ///
    /// Header names are matched case-insensitively. The first `authorization`
    /// header wins; every `cookie` header is kept and joined.
    pub fn from_headers<'a, I>(path: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = GateRequestBuilder::new(path);
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                if builder.authorization.is_none() {
                    builder = builder.authorization(value);
                }
            } else if name.eq_ignore_ascii_case(COOKIE_HEADER) {
                builder = builder.cookie(value);
            }
        }
        builder.build()
    }
}

/// Request builder for fluent construction
pub struct GateRequestBuilder {
    path: String,
    authorization: Option<String>,
    cookies: Vec<String>,
}

impl GateRequestBuilder {
    /// Create a new builder for a path
    pub fn new(path: impl Into<String>) -> Self {
        GateRequestBuilder {
            path: path.into(),
            authorization: None,
            cookies: Vec::new(),
        }
    }

    /// Set the `authorization` header value
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Shorthand for `authorization("Bearer <token>")`
    pub fn bearer(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.authorization(value)
    }

    /// Append a `cookie` header value
    pub fn cookie(mut self, value: impl Into<String>) -> Self {
        self.cookies.push(value.into());
        self
    }

    /// Build the request
    pub fn build(self) -> GateRequest {
        let mut request = GateRequest::new(self.path);
        request.authorization = self.authorization;
        if !self.cookies.is_empty() {
            request.cookie = Some(self.cookies.join("; "));
        }
        request
    }
}

/// Generate a unique request ID
fn generate_request_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("req_{:x}_{:x}", timestamp, counter)
}
