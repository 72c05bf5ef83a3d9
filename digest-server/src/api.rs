//! API response types served by the gateway itself

use crate::backend::models::ConnectionStatus;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Gateway status
    pub status: HealthStatus,

    /// Gateway version
    pub version: String,

    /// Uptime in seconds
    pub uptime_seconds: u64,

    /// Whether the backend answered its health check
    pub backend: ConnectionStatus,
}

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Gateway and backend are up
    Healthy,
    /// Gateway is up but the backend is not reachable
    Degraded,
}

impl HealthResponse {
    /// Build a response from the backend probe result
    pub fn new(uptime_seconds: u64, backend: ConnectionStatus) -> Self {
        let status = match backend {
            ConnectionStatus::Connected => HealthStatus::Healthy,
            ConnectionStatus::Disconnected => HealthStatus::Degraded,
        };
        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds,
            backend,
        }
    }
}
