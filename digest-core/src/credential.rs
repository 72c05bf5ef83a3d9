//! Credential extraction from bearer headers and cookies

use crate::request::GateRequest;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Default name of the cookie carrying the access token
pub const DEFAULT_TOKEN_COOKIE: &str = "digest-token";

const BEARER_PREFIX: &str = "bearer ";

/// Credentials found on a single request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Token from the bearer header, or from the token cookie when no bearer
    /// token was present
    pub token: Option<String>,
    /// Where the token came from
    pub source: Option<CredentialSource>,
    /// Names of configured session cookies present with a non-empty value
    pub session_cookies: Vec<String>,
}

impl Credentials {
    /// Whether any session cookie was found
    pub fn has_session(&self) -> bool {
        !self.session_cookies.is_empty()
    }
}

/// Origin of an extracted token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// `Authorization: Bearer <token>`
    Header,
    /// Token cookie
    Cookie,
}

/// Extracts credentials according to the configured cookie names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialExtractor {
    cookie_name: String,
    session_cookies: Vec<String>,
}

impl CredentialExtractor {
    /// Create an extractor reading the given token cookie and session cookies
    pub fn new(cookie_name: impl Into<String>, session_cookies: Vec<String>) -> Self {
        CredentialExtractor {
            cookie_name: cookie_name.into(),
            session_cookies,
        }
    }

    /// Name of the token cookie
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Extract every credential the request carries.
    ///
    /// The bearer header takes precedence; the token cookie is only consulted
    /// when the header yields nothing.
    pub fn extract(&self, request: &GateRequest) -> Credentials {
        let cookie_header = request.cookie.as_deref();

        let (token, source) = match extract_bearer(request.authorization.as_deref()) {
            Some(token) => (Some(token), Some(CredentialSource::Header)),
            None => match extract_cookie(cookie_header, &self.cookie_name) {
                Some(token) => (Some(token), Some(CredentialSource::Cookie)),
                None => (None, None),
            },
        };

        let session_cookies = self
            .session_cookies
            .iter()
            .filter(|name| extract_cookie(cookie_header, name).is_some())
            .cloned()
            .collect();

        Credentials {
            token,
            source,
            session_cookies,
        }
    }

    /// Extract only the token (bearer, then cookie)
    pub fn token(&self, request: &GateRequest) -> Option<String> {
        extract_bearer(request.authorization.as_deref())
            .or_else(|| extract_cookie(request.cookie.as_deref(), &self.cookie_name))
    }
}

impl Default for CredentialExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_COOKIE, Vec::new())
    }
}

/// Extract a bearer token from an `authorization` header value.
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// ignored. Returns `None` for other schemes or an empty token.
pub fn extract_bearer(header: Option<&str>) -> Option<String> {
    let value = header?.trim();
    let scheme = value.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = value[BEARER_PREFIX.len()..].trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Iterate over `key=value` pairs of a `cookie` header.
///
/// Pairs are split on the first `=`; both sides are trimmed. Segments
/// without `=` are skipped.
pub fn parse_cookies(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header.split(';').filter_map(|part| {
        let (key, value) = part.split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}

/// Find a cookie by name and URL-decode its value.
///
/// The first matching cookie wins. A value that fails to decode is returned
/// unchanged; an empty value counts as absent.
pub fn extract_cookie(header: Option<&str>, name: &str) -> Option<String> {
    let (_, raw) = parse_cookies(header?).find(|(key, _)| *key == name)?;
    if raw.is_empty() {
        return None;
    }
    let value = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
    Some(value.into_owned())
}
