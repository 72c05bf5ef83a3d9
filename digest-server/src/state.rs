//! Application state

use crate::backend::BackendClient;
use crate::proxy::BackendProxy;
use digest_core::Gate;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Edge gate with its swappable configuration snapshot
    pub gate: Arc<Gate>,

    /// Report proxy
    pub proxy: BackendProxy,

    /// Typed backend client, used for health probes
    pub backend: BackendClient,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(gate: Arc<Gate>, proxy: BackendProxy, backend: BackendClient) -> Self {
        Self {
            gate,
            proxy,
            backend,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
