//! Typed client for the digest backend API

use super::fixtures;
use super::models::*;
use super::{BackendError, BackendResult};
use digest_core::{AllowListSource, BackendConfig};
use reqwest::{header, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Client for the backend REST API
///
/// When fixtures are enabled, the read-mostly endpoints answer with canned
/// development data and never touch the network.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    authorization: Option<String>,
    service_tokens: Option<AllowListSource>,
    fixtures: bool,
}

impl BackendClient {
    /// Create a client for a base URL
    pub fn new(base_url: &str) -> BackendResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        Ok(BackendClient {
            http: reqwest::Client::new(),
            base_url,
            authorization: None,
            service_tokens: None,
            fixtures: false,
        })
    }

    /// Create a client from backend configuration
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        Ok(Self::new(config.base_url())?.with_fixtures(config.fixtures))
    }

    /// Reuse an existing connection pool
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Send this `authorization` header on every call
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Send `Bearer <token>` on every call
    pub fn with_bearer(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_authorization(value)
    }

    /// Fall back to the first allow-list token when no authorization is set
    pub fn with_service_tokens(mut self, source: AllowListSource) -> Self {
        self.service_tokens = Some(source);
        self
    }

    /// Serve canned data instead of calling the backend
    pub fn with_fixtures(mut self, enabled: bool) -> Self {
        self.fixtures = enabled;
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether fixture mode is on
    pub fn fixtures_enabled(&self) -> bool {
        self.fixtures
    }

    // Auth

    /// `POST /auth/callback/google`: exchange a Google credential for a session
    pub async fn google_callback(
        &self,
        request: &GoogleCallbackRequest,
    ) -> BackendResult<AuthCallbackResponse> {
        self.send(Method::POST, &["auth", "callback", "google"], Some(request))
            .await
    }

    // Sources

    /// `POST /sources/parse`: resolve a YouTube URL to a source
    pub async fn parse_youtube_url(&self, url: &str) -> BackendResult<Source> {
        let body = serde_json::json!({ "url": url });
        self.send(Method::POST, &["sources", "parse"], Some(&body))
            .await
    }

    /// `GET /sources`
    pub async fn list_sources(&self) -> BackendResult<Vec<Source>> {
        if self.fixtures {
            return Ok(fixtures::sources());
        }
        self.get(&["sources"]).await
    }

    /// `POST /sources`
    pub async fn create_source(&self, source: &NewSource) -> BackendResult<Source> {
        self.send(Method::POST, &["sources"], Some(source)).await
    }

    // Subscriptions

    /// `GET /subscriptions`
    pub async fn list_subscriptions(&self) -> BackendResult<Vec<Subscription>> {
        if self.fixtures {
            return Ok(fixtures::subscriptions());
        }
        self.get(&["subscriptions"]).await
    }

    /// `POST /subscriptions`
    pub async fn create_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> BackendResult<Subscription> {
        self.send(Method::POST, &["subscriptions"], Some(subscription))
            .await
    }

    /// `PATCH /subscriptions/{id}`
    pub async fn update_subscription(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> BackendResult<Subscription> {
        self.send(Method::PATCH, &["subscriptions", id], Some(update))
            .await
    }

    /// `DELETE /subscriptions/{id}`
    pub async fn delete_subscription(&self, id: &str) -> BackendResult<()> {
        self.send::<(), ()>(Method::DELETE, &["subscriptions", id], None)
            .await
    }

    // Reports

    /// `POST /reports/onetime`: request a report for a single video
    pub async fn generate_one_time_report(
        &self,
        video_url: &str,
        lang: Option<&str>,
    ) -> BackendResult<OneTimeReportResponse> {
        if self.fixtures {
            return Ok(fixtures::one_time_report());
        }
        let body = OneTimeReportRequest {
            video_url: video_url.to_string(),
            lang: lang.map(str::to_string),
        };
        self.send(Method::POST, &["reports", "onetime"], Some(&body))
            .await
    }

    /// `GET /reports`, filtered by the query string
    pub async fn list_reports(&self, query: &ReportQuery) -> BackendResult<Vec<Report>> {
        if self.fixtures {
            return Ok(fixtures::reports());
        }
        let url = self.endpoint(&["reports"])?;
        let request = self.http.get(url).query(query);
        self.execute(request).await
    }

    /// `GET /reports/{id}`
    pub async fn get_report(&self, id: &str) -> BackendResult<Report> {
        if self.fixtures {
            return Ok(fixtures::report(id));
        }
        self.get(&["reports", id]).await
    }

    // Feedback

    /// `POST /feedback`
    pub async fn submit_feedback(
        &self,
        feedback: &FeedbackRequest,
    ) -> BackendResult<FeedbackResponse> {
        self.send(Method::POST, &["feedback"], Some(feedback)).await
    }

    // System

    /// `GET /health`
    pub async fn check_health(&self) -> BackendResult<HealthCheckResponse> {
        self.get(&["health"]).await
    }

    /// Build `<base>/<segments…>`, each segment percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> BackendResult<T> {
        self.send::<(), T>(Method::GET, segments, None).await
    }

    async fn send<B, T>(&self, method: Method, segments: &[&str], body: Option<&B>) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request).await
    }

    #[instrument(skip_all)]
    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> BackendResult<T> {
        let request = match self.credential() {
            Some(value) => request.header(header::AUTHORIZATION, value),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Backend responded");

        if status == reqwest::StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Null).map_err(|e| BackendError::Decode(e.to_string()));
        }

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let payload = if is_json {
            let bytes = response.bytes().await?;
            serde_json::from_slice::<Value>(&bytes).map_err(|e| BackendError::Decode(e.to_string()))?
        } else {
            Value::String(response.text().await?)
        };

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: payload,
            });
        }

        serde_json::from_value(payload).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn credential(&self) -> Option<String> {
        if let Some(value) = &self.authorization {
            return Some(value.clone());
        }
        let tokens = self.service_tokens.as_ref()?.current();
        tokens.primary().map(|token| format!("Bearer {}", token))
    }
}
