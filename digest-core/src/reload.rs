//! Hot-reload coordinator for the gate configuration
//!
//! Watches the configuration file, waits for writes to settle, parses the
//! new file and swaps the gate snapshot. A file that fails to parse or
//! validate leaves the running configuration untouched.

use crate::config::DigestConfig;
use crate::error::Result;
use crate::gate::Gate;
use crate::watcher::{ChangeKind, ConfigWatcher, EventDebouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Reload event sent after each reload attempt
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Path that triggered the reload
    pub path: PathBuf,
    /// Result of the reload
    pub result: ReloadResult,
    /// When the attempt finished
    pub timestamp: std::time::Instant,
}

/// Result of a reload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadResult {
    /// New configuration is live
    Success,
    /// Reload failed; previous configuration retained
    Failed(String),
    /// Nothing to reload
    Skipped(String),
}

impl ReloadResult {
    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadResult::Success => "success",
            ReloadResult::Failed(_) => "failed",
            ReloadResult::Skipped(_) => "skipped",
        }
    }
}

/// Configuration for the reload coordinator
#[derive(Debug, Clone)]
pub struct ReloadConfig {
    /// Wait for file writes to settle
    pub debounce_duration: Duration,
    /// How long to block on the watcher per loop iteration
    pub poll_interval: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        ReloadConfig {
            debounce_duration: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Hot-reload coordinator
pub struct ReloadCoordinator {
    gate: Arc<Gate>,
    watcher: ConfigWatcher,
    debouncer: EventDebouncer,
    config: ReloadConfig,
    event_tx: Option<mpsc::UnboundedSender<ReloadEvent>>,
}

impl ReloadCoordinator {
    /// Watch `path` and reload `gate` on change
    pub fn new(gate: Arc<Gate>, path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(gate, path, ReloadConfig::default())
    }

    /// Create a coordinator with custom timing
    pub fn with_config(
        gate: Arc<Gate>,
        path: impl AsRef<Path>,
        config: ReloadConfig,
    ) -> Result<Self> {
        let watcher = ConfigWatcher::new(path)?;
        let debouncer = EventDebouncer::new(config.debounce_duration);

        Ok(ReloadCoordinator {
            gate,
            watcher,
            debouncer,
            config,
            event_tx: None,
        })
    }

    /// Path being watched
    pub fn path(&self) -> &Path {
        self.watcher.path()
    }

    /// Subscribe to reload events
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ReloadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    /// Run until the task is dropped
    pub async fn run(mut self) -> Result<()> {
        info!("Reload coordinator started for {:?}", self.watcher.path());

        loop {
            if let Some(event) = self.watcher.recv_timeout(self.config.poll_interval).await {
                debug!("File change event: {:?}", event);
                self.debouncer.add_event(event);
            }

            for event in self.debouncer.get_settled_events() {
                let result = if event.kind == ChangeKind::Removed {
                    warn!("Config file removed, keeping current configuration");
                    ReloadResult::Skipped("file removed".to_string())
                } else {
                    reload_gate(&self.gate, &event.path).await
                };

                if let Some(tx) = &self.event_tx {
                    let reload_event = ReloadEvent {
                        path: event.path.clone(),
                        result,
                        timestamp: std::time::Instant::now(),
                    };
                    if tx.send(reload_event).is_err() {
                        debug!("Reload event dropped (no subscriber)");
                    }
                }
            }
        }
    }

    /// Reload immediately, bypassing the watcher
    pub async fn manual_reload(&self) -> ReloadResult {
        reload_gate(&self.gate, self.watcher.path()).await
    }
}

/// Read, parse and apply the gate section of a configuration file
pub async fn reload_gate(gate: &Gate, path: &Path) -> ReloadResult {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to read {:?}: {}", path, e);
            return ReloadResult::Failed(format!("Failed to read file: {}", e));
        }
    };

    let config = match DigestConfig::from_toml(&content) {
        Ok(c) => c,
        Err(e) => {
            error!("Rejected configuration from {:?}: {}", path, e);
            return ReloadResult::Failed(e.to_string());
        }
    };

    if let Err(e) = gate.reload(&config.gate) {
        error!("Failed to apply gate configuration: {}", e);
        return ReloadResult::Failed(e.to_string());
    }

    info!("Reloaded gate configuration from {:?}", path);
    ReloadResult::Success
}
