//! Edge gate middleware
//!
//! Runs before routing. Public paths pass straight through; gated paths need
//! an allow-listed token or a configured session cookie. Denials short-circuit with a
//! 401 JSON body on API paths or a temporary redirect to the login page.

use crate::error::ApiError;
use crate::state::AppState;
use crate::{metrics, tracing as telemetry};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use digest_core::{Denial, GateDecision, GateRequest};
use std::borrow::Cow;
use tracing::debug;

/// Gate every request against the current configuration
pub async fn edge_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let gate_request = gate_request(request.uri().path(), request.headers());

    let span = telemetry::create_gate_span(request.method().as_str(), &gate_request.path);
    let decision = {
        let _guard = span.enter();
        let decision = state.gate.evaluate(&gate_request);
        telemetry::record_decision(decision.label());
        decision
    };
    metrics::record_gate_decision(&decision);

    match decision {
        GateDecision::Allow { .. } => next.run(request).await,
        GateDecision::Deny { denial } => {
            debug!(
                request_id = %gate_request.request_id,
                path = %gate_request.path,
                "Request denied at the edge"
            );
            deny_response(denial)
        }
    }
}

/// Build the gate's view of an HTTP request
///
/// Header values are decoded lossily, so a non-ASCII cookie elsewhere in the
/// header does not hide the token cookie next to it.
pub fn gate_request(path: &str, headers: &HeaderMap) -> GateRequest {
    let pairs: Vec<(&str, Cow<'_, str>)> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes())))
        .collect();
    GateRequest::from_headers(path, pairs.iter().map(|(name, value)| (*name, value.as_ref())))
}

fn deny_response(denial: Denial) -> Response {
    match denial {
        Denial::Unauthorized => ApiError::Unauthorized.into_response(),
        Denial::Redirect { location } => Redirect::temporary(&location).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn test_gate_request_from_header_map() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("digest-token=xyz"));

        let request = gate_request("/dashboard", &headers);
        assert_eq!(request.path, "/dashboard");
        assert_eq!(request.authorization.as_deref(), Some("Bearer abc"));
        assert_eq!(request.cookie.as_deref(), Some("a=1; digest-token=xyz"));
    }

    #[test]
    fn test_invalid_utf8_header_decoded_lossily() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff").unwrap(),
        );

        let request = gate_request("/api/report/1", &headers);
        assert_eq!(request.authorization.as_deref(), Some("Bearer \u{fffd}"));
    }

    #[test]
    fn test_non_ascii_neighbour_cookie_keeps_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_bytes("name=José; digest-token=secret".as_bytes()).unwrap(),
        );

        let request = gate_request("/dashboard", &headers);
        assert_eq!(request.cookie.as_deref(), Some("name=José; digest-token=secret"));
    }

    #[test]
    fn test_redirect_is_temporary() {
        let response = deny_response(Denial::Redirect {
            location: "/onboarding?from=%2Freport%2F1".into(),
        });
        assert_eq!(response.status(), axum::http::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/onboarding?from=%2Freport%2F1"
        );
    }
}
