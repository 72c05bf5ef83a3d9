//! Report proxy: forwards `/api/report/{id}` to the backend's `/reports/{id}`
//!
//! The upstream status and JSON body are relayed unchanged, error statuses
//! included, and the body bytes are passed through as received once they
//! parse as JSON. Only a failed connection or an unreadable body turns into a
//! 502 `PROXY_ERROR`. One attempt per request, no retries.
//!
//! An empty upstream body is relayed as an empty response with the upstream
//! status. The web app's own report route answered 502 in that case; the
//! gateway keeps bodiless statuses such as 204 intact instead.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::{metrics, tracing as telemetry};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Url;
use serde::de::IgnoredAny;
use tracing::{debug, warn};

/// Request headers copied to the upstream call
const FORWARDED_HEADERS: [header::HeaderName; 2] = [header::AUTHORIZATION, header::COOKIE];

/// Forwards report requests to the backend
#[derive(Debug, Clone)]
pub struct BackendProxy {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendProxy {
    /// Create a proxy for a backend base URL
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a proxy sharing an existing connection pool
    pub fn with_client(base_url: &str, http: reqwest::Client) -> ApiResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::Internal(format!("Invalid backend URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Internal(format!(
                "Invalid backend URL {}",
                base_url
            )));
        }
        Ok(BackendProxy { http, base_url })
    }

    /// Upstream URL for a report id; the id is always a single path segment
    pub fn report_url(&self, id: &str) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Internal(format!("Invalid backend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["reports", id]);
        Ok(url)
    }

    /// Forward one request and relay the upstream answer
    pub async fn forward(
        &self,
        method: &Method,
        id: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> ApiResult<Response> {
        let url = self.report_url(id)?;
        debug!(%method, %url, "Proxying report request");

        let mut request = if method == Method::POST {
            self.http.post(url.clone()).body(body)
        } else {
            self.http.get(url.clone())
        };
        request = request.header(header::CONTENT_TYPE, "application/json");
        for name in &FORWARDED_HEADERS {
            for value in headers.get_all(name) {
                request = request.header(name.clone(), value.clone());
            }
        }

        let upstream = telemetry::trace_upstream(url.as_str(), request.send())
            .await
            .map_err(|e| ApiError::proxy(e.to_string()))?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .map_err(|e| ApiError::proxy(e.to_string()))?;
        let bytes = upstream
            .bytes()
            .await
            .map_err(|e| ApiError::proxy(e.to_string()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((status, Body::empty()).into_response());
        }

        serde_json::from_slice::<IgnoredAny>(&bytes).map_err(|e| ApiError::proxy(e.to_string()))?;
        Ok((status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response())
    }
}

/// `GET|POST /api/report/:id`
pub async fn proxy_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let timer = metrics::LatencyTimer::start();
    let result = state.proxy.forward(&method, &id, &headers, body).await;

    match &result {
        Ok(_) => metrics::record_proxy_request("relayed", timer.elapsed_seconds()),
        Err(e) => {
            warn!(report_id = %id, "Backend proxy failed: {}", e);
            metrics::record_proxy_request("error", timer.elapsed_seconds());
        }
    }
    result
}
