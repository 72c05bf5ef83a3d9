//! HTTP request handlers served by the gateway itself

use crate::api::HealthResponse;
use crate::backend::models::ConnectionStatus;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, http::Uri, Json};
use tracing::{debug, warn};

/// Liveness probe; always 200, reports backend reachability in the body
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = match state.backend.check_health().await {
        Ok(health) => {
            debug!(status = ?health.status, "Backend health check passed");
            ConnectionStatus::Connected
        }
        Err(e) => {
            warn!("Backend health check failed: {}", e);
            ConnectionStatus::Disconnected
        }
    };

    Json(HealthResponse::new(state.uptime_seconds(), backend))
}

/// Prometheus metrics endpoint
pub async fn metrics() -> String {
    crate::metrics::get_prometheus_metrics()
}

/// Fallback for routes that passed the gate but match nothing
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
