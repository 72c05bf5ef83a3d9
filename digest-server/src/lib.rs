//! Digest Server - edge gateway for the Cognition Digest web app
//!
//! Gates page and API traffic with the `digest-core` edge gate, proxies
//! report requests to the backend, and exposes health and Prometheus
//! metrics endpoints. A typed client for the backend REST API is included.

pub mod api;
pub mod backend;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod state;
pub mod tracing;

pub use api::{HealthResponse, HealthStatus};
pub use backend::{BackendClient, BackendError};
pub use error::{ApiError, ApiResult};
pub use proxy::BackendProxy;
pub use router::build_router;
pub use state::AppState;
