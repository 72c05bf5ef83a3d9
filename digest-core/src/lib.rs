//! Digest Core - request gating for the Cognition Digest edge
//!
//! This crate decides, per request, whether traffic to the digest web app
//! may proceed: it extracts credentials from bearer headers and cookies,
//! checks them against a token allow-list, classifies the path and picks the
//! deny shape (401 JSON for API paths, login redirect for pages).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod policy;
pub mod reload;
pub mod request;
pub mod route;
pub mod watcher;

pub use config::{BackendConfig, DigestConfig, GateConfig, ServerConfig};
pub use credential::{extract_bearer, extract_cookie, CredentialExtractor, Credentials};
pub use error::{GateError, Result};
pub use gate::{AllowReason, Denial, Gate, GateDecision};
pub use policy::{is_token_authorized, AllowList, AllowListSource};
pub use reload::{ReloadCoordinator, ReloadEvent, ReloadResult};
pub use request::{GateRequest, GateRequestBuilder};
pub use route::{RouteClass, RouteTable};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
