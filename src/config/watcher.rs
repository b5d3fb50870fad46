//! File watcher for config file sources.
//!
//! Watches the directories holding the store's file sources and emits an
//! event through a tokio watch channel whenever one of those files changes.
//! Uses debouncing to coalesce rapid writes (editors often save in several
//! steps). Consumers react by calling
//! [`ConfigStore::reload_file_sources`](super::ConfigStore::reload_file_sources)
//! followed by [`ConfigStore::update`](super::ConfigStore::update).

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Event types emitted when watched files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// A single config file changed
    FileChanged(PathBuf),
    /// Multiple files changed in quick succession
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error
    Error(String),
}

impl ConfigChangeEvent {
    /// Returns true if this event requires a reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, ConfigChangeEvent::Error(_))
    }

    /// Get the affected paths for this event.
    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            ConfigChangeEvent::FileChanged(p) => vec![p.as_path()],
            ConfigChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            ConfigChangeEvent::Error(_) => vec![],
        }
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Handle to control the config watcher.
pub struct ConfigWatcherHandle {
    /// Receiver for change events.
    pub events: watch::Receiver<Option<ConfigChangeEvent>>,
    /// Blocking task forwarding events. Dropping the handle detaches it; the
    /// task exits on its next send once `events` has been dropped.
    _task_handle: tokio::task::JoinHandle<()>,
}

impl ConfigWatcherHandle {
    /// Wait for the next change event. Returns `None` once the watcher stops.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        // Skip the initial None value
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }
}

/// Starts watching `files`.
///
/// Each file's parent directory is watched non-recursively, so files that do
/// not exist yet are picked up once created. Must be called inside a tokio
/// runtime.
pub fn start_config_watcher(
    files: &[PathBuf],
    config: WatcherConfig,
) -> Result<ConfigWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    let watched: Vec<PathBuf> = files.iter().map(|p| absolute(p)).collect();
    let dirs: BTreeSet<PathBuf> = watched
        .iter()
        .filter_map(|p| p.parent().map(Path::to_path_buf))
        .collect();

    for dir in &dirs {
        if dir.exists() {
            info!("Watching config directory: {}", dir.display());
            watcher.watch(dir, notify::RecursiveMode::NonRecursive)?;
        } else {
            warn!(
                "Config directory does not exist, skipping watch: {}",
                dir.display()
            );
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &watched);
    });

    Ok(ConfigWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Forward debounced notify events as [`ConfigChangeEvent`]s.
fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<ConfigChangeEvent>>,
    watched: &[PathBuf],
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let paths = events.into_iter().filter_map(|event| {
                    matches!(
                        event.kind,
                        DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                    )
                    .then_some(event.path)
                });
                if let Some(event) = classify_paths(paths, watched) {
                    debug!("Config change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Config watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                if tx.send(Some(ConfigChangeEvent::Error(e.to_string()))).is_err() {
                    return;
                }
            }
            Err(_) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Keep only paths that are watched files and fold them into one event.
fn classify_paths(
    paths: impl IntoIterator<Item = PathBuf>,
    watched: &[PathBuf],
) -> Option<ConfigChangeEvent> {
    let mut changed: Vec<PathBuf> = paths
        .into_iter()
        .filter(|p| watched.iter().any(|w| w == p || same_file_name_in_dir(w, p)))
        .collect();
    changed.sort();
    changed.dedup();

    match changed.len() {
        0 => None,
        1 => changed.pop().map(ConfigChangeEvent::FileChanged),
        _ => Some(ConfigChangeEvent::BatchChange(changed)),
    }
}

/// Event paths may come back canonicalized (e.g. through symlinked temp
/// dirs), so compare file name and canonical parent as a fallback.
fn same_file_name_in_dir(watched: &Path, event: &Path) -> bool {
    if watched.file_name() != event.file_name() {
        return false;
    }
    match (watched.parent(), event.parent()) {
        (Some(a), Some(b)) => match (a.canonicalize(), b.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watched() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/etc/app/user.cfg"),
            PathBuf::from("/etc/app/site.cfg"),
        ]
    }

    #[test]
    fn test_classify_single_file() {
        let result = classify_paths([PathBuf::from("/etc/app/user.cfg")], &watched());
        assert_eq!(
            result,
            Some(ConfigChangeEvent::FileChanged(PathBuf::from("/etc/app/user.cfg")))
        );
    }

    #[test]
    fn test_classify_batch_dedups() {
        let result = classify_paths(
            [
                PathBuf::from("/etc/app/site.cfg"),
                PathBuf::from("/etc/app/user.cfg"),
                PathBuf::from("/etc/app/user.cfg"),
            ],
            &watched(),
        );
        match result {
            Some(ConfigChangeEvent::BatchChange(paths)) => assert_eq!(paths.len(), 2),
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_ignores_unwatched() {
        let result = classify_paths(
            [
                PathBuf::from("/etc/app/user.cfg.tmp"),
                PathBuf::from("/etc/app/other.cfg"),
            ],
            &watched(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(ConfigChangeEvent::FileChanged(PathBuf::new()).requires_reload());
        assert!(ConfigChangeEvent::BatchChange(vec![]).requires_reload());
        assert!(!ConfigChangeEvent::Error("test".to_string()).requires_reload());
    }

    #[test]
    fn test_affected_paths() {
        let event = ConfigChangeEvent::BatchChange(watched());
        assert_eq!(event.affected_paths().len(), 2);
        assert!(ConfigChangeEvent::Error("x".into()).affected_paths().is_empty());
    }

    #[test]
    fn test_forwarding_stops_once_receiver_dropped() {
        let (notify_tx, notify_rx) = mpsc::channel();
        let (tx, rx) = watch::channel(None);
        drop(rx);

        // The notify side stays open; only the failed send ends the loop
        notify_tx.send(Err(notify::Error::generic("boom"))).unwrap();
        process_notify_events(notify_rx, tx, &watched());
        drop(notify_tx);
    }
}
