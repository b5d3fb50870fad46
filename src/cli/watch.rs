//! Watch command: follow the config files and print resolved changes.

use crate::config::ConfigStore;
use crate::config::watcher::{ConfigChangeEvent, WatcherConfig, start_config_watcher};
use crate::format::{OutputFormat, format_value};
use anyhow::{Context, Result};
use clap::Args;
use std::time::Duration;
use tracing::{info, warn};

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Keys to follow (default: every key currently resolvable)
    pub keys: Vec<String>,

    /// Debounce window in milliseconds
    #[arg(long, default_value_t = 500)]
    pub debounce_ms: u64,
}

impl WatchArgs {
    /// Keys to observe, falling back to everything the store resolves.
    pub fn resolve_keys(&self, store: &ConfigStore) -> Vec<String> {
        if self.keys.is_empty() {
            store.data().into_keys().collect()
        } else {
            self.keys.clone()
        }
    }
}

/// Reload the file sources after `event` and deliver pending changes.
///
/// Returns the number of observer callbacks fired.
pub fn apply_change(store: &ConfigStore, event: &ConfigChangeEvent) -> Result<usize> {
    if !event.requires_reload() {
        if let ConfigChangeEvent::Error(message) = event {
            warn!("Config watcher error: {}", message);
        }
        return Ok(0);
    }

    for path in event.affected_paths() {
        info!("Config file changed: {}", path.display());
    }
    store
        .reload_file_sources()
        .context("Failed to reload config files")?;
    Ok(store.update())
}

/// Run until interrupted, printing every observed change.
pub async fn run_watch(store: &ConfigStore, args: &WatchArgs, format: OutputFormat) -> Result<()> {
    let keys = args.resolve_keys(store);
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();

    let token = store.add_observer(
        move |key, value| match format_value(key, value, format) {
            Ok(line) if format == OutputFormat::Text => print!("{} = {}", key, line),
            Ok(line) => print!("{}", line),
            Err(e) => warn!("Failed to format change of {}: {}", key, e),
        },
        &key_refs,
    );

    let config = WatcherConfig {
        debounce_duration: Duration::from_millis(args.debounce_ms),
    };
    let result = watch_loop(store, config).await;

    store.remove_observer(token);
    result
}

async fn watch_loop(store: &ConfigStore, config: WatcherConfig) -> Result<()> {
    let mut handle = start_config_watcher(&store.file_paths(), config)
        .context("Failed to start config file watcher")?;
    info!("Watching {} config file(s)", store.file_paths().len());

    loop {
        tokio::select! {
            event = handle.wait_for_change() => match event {
                Some(event) => {
                    if let Err(e) = apply_change(store, &event) {
                        warn!("{:#}", e);
                    }
                }
                None => {
                    // Sender dropped -- watcher stopped
                    info!("Config file watcher stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLocations, ConfigVariable, MetadataRegistry, StoreBuilder};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> (PathBuf, ConfigStore) {
        let path = temp.path().join("settings.cfg");
        fs::write(&path, "Name = bob\n").unwrap();
        let store = StoreBuilder::new(ConfigLocations::new(&path))
            .metadata(
                MetadataRegistry::new()
                    .with(ConfigVariable::new("Name", "anon"))
                    .with(ConfigVariable::new("Volume", "100")),
            )
            .build()
            .unwrap();
        (path, store)
    }

    #[test]
    fn test_resolve_keys_defaults_to_all() {
        let temp = TempDir::new().unwrap();
        let (_path, store) = open(&temp);

        let args = WatchArgs {
            keys: vec![],
            debounce_ms: 500,
        };
        assert_eq!(args.resolve_keys(&store), vec!["Name", "Volume"]);
    }

    #[test]
    fn test_apply_change_notifies_observers() {
        let temp = TempDir::new().unwrap();
        let (path, store) = open(&temp);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = store.add_observer(
            move |k, v| sink.lock().unwrap().push(format!("{}={}", k, v)),
            &["Name"],
        );

        fs::write(&path, "Name = alice\n").unwrap();
        let fired = apply_change(&store, &ConfigChangeEvent::FileChanged(path)).unwrap();

        assert_eq!(fired, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["Name=alice".to_string()]);
        store.remove_observer(token);
    }

    #[test]
    fn test_apply_change_ignores_errors() {
        let temp = TempDir::new().unwrap();
        let (_path, store) = open(&temp);

        let event = ConfigChangeEvent::Error("boom".to_string());
        assert_eq!(apply_change(&store, &event).unwrap(), 0);
    }
}
