//! File watching for configuration hot reload
//!
//! Editors commonly replace a file instead of writing it in place, so the
//! watcher observes the parent directory and filters events down to the
//! configured file name.

use crate::error::{GateError, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, info, trace};

/// File change event
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: ChangeKind,
    /// When the change was observed
    pub timestamp: Instant,
}

/// Type of file change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File was created (including atomic replace)
    Created,
    /// File contents were modified
    Modified,
    /// File was removed
    Removed,
}

/// Watches a single configuration file
pub struct ConfigWatcher {
    /// Kept alive for as long as events are wanted
    _watcher: RecommendedWatcher,
    event_rx: UnboundedReceiver<FileChangeEvent>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Start watching `path`. The file must exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GateError::ConfigError(format!(
                "Config file does not exist: {:?}",
                path
            )));
        }
        let path = path.canonicalize()?;
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| GateError::ConfigError(format!("Not a file path: {:?}", path)))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| GateError::ConfigError(format!("No parent directory: {:?}", path)))?;

        let (tx, rx) = unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if let Some(change) = process_notify_event(event, &file_name) {
                        if tx.send(change).is_err() {
                            trace!("Config watcher receiver dropped");
                        }
                    }
                }
                Err(e) => error!("File watch error: {}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Watching configuration file: {:?}", path);

        Ok(ConfigWatcher {
            _watcher: watcher,
            event_rx: rx,
            path,
        })
    }

    /// Canonical path being watched
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next change event, up to `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<FileChangeEvent> {
        tokio::time::timeout(timeout, self.event_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Receive a pending event without waiting
    pub fn try_recv(&mut self) -> Option<FileChangeEvent> {
        self.event_rx.try_recv().ok()
    }
}

fn process_notify_event(event: Event, file_name: &std::ffi::OsStr) -> Option<FileChangeEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(modify_kind) => {
            use notify::event::ModifyKind;
            match modify_kind {
                ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any => {
                    ChangeKind::Modified
                }
                _ => return None,
            }
        }
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return None,
    };

    let path = event
        .paths
        .into_iter()
        .find(|p| p.file_name() == Some(file_name))?;

    debug!("Config file event {:?} for {:?}", kind, path);
    Some(FileChangeEvent {
        path,
        kind,
        timestamp: Instant::now(),
    })
}

/// Debouncer for file change events
///
/// Files may be written in several chunks, producing several events. Events
/// are held until no new event arrived for the debounce duration.
pub struct EventDebouncer {
    duration: Duration,
    pending: HashMap<PathBuf, (FileChangeEvent, Instant)>,
}

impl EventDebouncer {
    /// Create a new debouncer with the given settle duration
    pub fn new(duration: Duration) -> Self {
        EventDebouncer {
            duration,
            pending: HashMap::new(),
        }
    }

    /// Record an event, restarting the settle timer for its path
    pub fn add_event(&mut self, event: FileChangeEvent) {
        self.pending
            .insert(event.path.clone(), (event, Instant::now()));
    }

    /// Take events that have settled
    pub fn get_settled_events(&mut self) -> Vec<FileChangeEvent> {
        let now = Instant::now();
        let settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, seen))| now.duration_since(*seen) >= self.duration)
            .map(|(path, _)| path.clone())
            .collect();

        settled
            .into_iter()
            .filter_map(|path| self.pending.remove(&path).map(|(event, _)| event))
            .collect()
    }

    /// Whether any event is still settling
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop all pending events
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
