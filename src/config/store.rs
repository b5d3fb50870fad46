//! The layered configuration store.
//!
//! Sources are held in fixed precedence order (highest first):
//! overlay, optional safemode, writable primary file, additional files,
//! optional platform sources, defaults. Reads return the first hit. Persistent
//! writes store only values that differ from what the layers below would
//! already supply.

use super::delta::{self, RedundantEntry};
use super::file::FileSource;
use super::loader::SourceKind;
use super::metadata::{MetadataRegistry, parse_bool};
use super::observers::{ObserverCallback, ObserverRegistry, ObserverToken};
use super::overlay::OverlaySource;
use super::source::{ReadSource, StringMap, WriteSource};
use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

/// Layered key/value configuration with delta persistence and observers.
///
/// Reads take no lock; each source swaps its map atomically, so a read racing
/// a write sees either the old or the new value. Observer bookkeeping is
/// serialized by the [`ObserverRegistry`] mutex.
///
/// All observers must be removed before the store is dropped.
#[derive(Debug)]
pub struct ConfigStore {
    overlay: Arc<OverlaySource>,
    primary: Arc<FileSource>,
    primary_index: usize,
    files: Vec<Arc<FileSource>>,
    sources: Vec<Arc<dyn ReadSource>>,
    kinds: Vec<SourceKind>,
    metadata: Arc<MetadataRegistry>,
    observers: ObserverRegistry,
    writing_enabled: AtomicBool,
}

/// Sources handed over by the builder, already in precedence order.
pub(crate) struct StoreParts {
    pub overlay: Arc<OverlaySource>,
    pub primary: Arc<FileSource>,
    pub files: Vec<Arc<FileSource>>,
    pub layers: Vec<(SourceKind, Arc<dyn ReadSource>)>,
    pub metadata: Arc<MetadataRegistry>,
    pub writing_enabled: bool,
}

impl ConfigStore {
    pub(crate) fn from_parts(parts: StoreParts) -> Self {
        let primary_index = parts
            .layers
            .iter()
            .position(|(kind, _)| *kind == SourceKind::Primary)
            .unwrap_or(1);
        let (kinds, sources) = parts.layers.into_iter().unzip();

        Self {
            overlay: parts.overlay,
            primary: parts.primary,
            primary_index,
            files: parts.files,
            sources,
            kinds,
            metadata: parts.metadata,
            observers: ObserverRegistry::new(),
            writing_enabled: AtomicBool::new(parts.writing_enabled),
        }
    }

    // ---- Read path ----

    /// First-hit traversal, clamped through the key's metadata.
    fn resolve(&self, key: &str) -> Option<String> {
        let raw = self.sources.iter().find_map(|s| s.get_string(key))?;
        Some(match self.metadata.get(key) {
            Some(meta) => meta.clamp(&raw),
            None => raw,
        })
    }

    /// Resolve `key`. Fails when no source holds it.
    pub fn get_string(&self, key: &str) -> ConfigResult<String> {
        self.resolve(key)
            .ok_or_else(|| ConfigError::key_not_registered(key))
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.sources.iter().any(|s| s.is_set(key))
    }

    /// Whether the key is declared read-only. Unknown keys are writable.
    pub fn is_read_only(&self, key: &str) -> bool {
        self.metadata.is_read_only(key)
    }

    /// Resolve `key` and parse it with [`FromStr`].
    pub fn get<T: FromStr>(&self, key: &str) -> ConfigResult<T> {
        let value = self.get_string(key)?;
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn get_int(&self, key: &str) -> ConfigResult<i64> {
        self.get(key)
    }

    pub fn get_float(&self, key: &str) -> ConfigResult<f64> {
        self.get(key)
    }

    /// Resolve `key` as a boolean (`1/0`, `true/false`, `yes/no`, `on/off`).
    pub fn get_bool(&self, key: &str) -> ConfigResult<bool> {
        let value = self.get_string(key)?;
        parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            expected: "bool",
        })
    }

    /// Clamped value of every key any source holds.
    fn resolved(&self) -> StringMap {
        self.data()
            .into_keys()
            .filter_map(|key| self.resolve(&key).map(|v| (key, v)))
            .collect()
    }

    /// Merged view: the highest-precedence raw value of every key.
    pub fn data(&self) -> StringMap {
        let mut merged = StringMap::new();
        for source in &self.sources {
            for (key, value) in source.data() {
                merged.entry(key).or_insert(value);
            }
        }
        merged
    }

    /// Persisted values that differ from what they would inherit.
    pub fn data_without_defaults(&self) -> StringMap {
        delta::data_without_defaults(&self.sources)
    }

    // ---- Write path ----

    /// Set `key` to `value`.
    ///
    /// With `use_overlay` the value goes to the volatile overlay only.
    /// Otherwise any overlay entry is dropped and the value is persisted to the
    /// primary file, unless the nearest lower source that sets the key already
    /// holds exactly `value`, in which case the primary's entry is deleted.
    pub fn set_string(&self, key: &str, value: &str, use_overlay: bool) -> ConfigResult<()> {
        if !use_overlay {
            self.overlay.delete(key)?;
        }

        if self.resolve(key).as_deref() == Some(value) {
            debug!("{} already resolves to {:?}, nothing to do", key, value);
            return Ok(());
        }

        if use_overlay {
            self.overlay.set_string(key, value)?;
        } else if self.writing_enabled() {
            self.persist(key, value)?;
        }

        self.observers.record(key, value);
        Ok(())
    }

    fn persist(&self, key: &str, value: &str) -> ConfigResult<()> {
        let inherited = self.sources[self.primary_index + 1..]
            .iter()
            .find_map(|s| s.get_string(key));

        if inherited.as_deref() == Some(value) {
            debug!("{} = {:?} matches inherited value, deleting from primary", key, value);
            self.primary.delete(key)
        } else {
            debug!("{} = {:?} stored in {}", key, value, self.primary.name());
            self.primary.set_string(key, value)
        }
    }

    /// Format `value` and [`set_string`](Self::set_string) it.
    pub fn set<T: Display>(&self, key: &str, value: T, use_overlay: bool) -> ConfigResult<()> {
        self.set_string(key, &value.to_string(), use_overlay)
    }

    /// Remove `key` from every writable source. Observers are not notified.
    pub fn delete(&self, key: &str) -> ConfigResult<()> {
        for source in &self.sources {
            if let Some(writable) = source.as_writable() {
                writable.delete(key)?;
            }
        }
        Ok(())
    }

    pub fn writing_enabled(&self) -> bool {
        self.writing_enabled.load(Ordering::Relaxed)
    }

    /// Toggle persistence. While disabled, non-overlay writes are not stored
    /// but observers are still notified.
    pub fn set_writing_enabled(&self, enabled: bool) {
        self.writing_enabled.store(enabled, Ordering::Relaxed);
    }

    // ---- Default elimination ----

    /// Delete persisted entries that duplicate their inherited value.
    pub fn remove_defaults(&self) -> ConfigResult<Vec<RedundantEntry>> {
        delta::remove_defaults(&self.sources)
    }

    /// What [`remove_defaults`](Self::remove_defaults) would delete.
    pub fn plan_default_removal(&self) -> Vec<RedundantEntry> {
        delta::plan_default_removal(&self.sources)
    }

    // ---- Observers ----

    /// Register `callback` for `keys` under a new holder.
    pub fn add_observer<F>(&self, callback: F, keys: &[&str]) -> ObserverToken
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.observers.add(Arc::new(callback), &owned_keys(keys))
    }

    /// Register another callback for more keys under an existing holder.
    pub fn add_observer_keys<F>(
        &self,
        token: ObserverToken,
        callback: F,
        keys: &[&str],
    ) -> ConfigResult<()>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let callback: ObserverCallback = Arc::new(callback);
        self.observers.add_keys(token, callback, &owned_keys(keys))
    }

    /// Remove every registration of `token`'s holder. Unknown tokens are ignored.
    pub fn remove_observer(&self, token: ObserverToken) {
        self.observers.remove(token);
    }

    /// Notify observers of every key changed since the last call.
    ///
    /// Returns the number of callbacks invoked.
    pub fn update(&self) -> usize {
        self.observers.update()
    }

    /// Keys written since the last [`update`](Self::update), with their latest value.
    pub fn pending_changes(&self) -> StringMap {
        self.observers.pending()
    }

    // ---- File sources ----

    /// Re-read every file source. Returns the keys whose file contents
    /// changed.
    ///
    /// Only keys whose resolved value differs afterwards are queued for
    /// observers; a file edit shadowed by the overlay or safemode is silent.
    pub fn reload_file_sources(&self) -> ConfigResult<Vec<String>> {
        let before = self.resolved();

        let mut changed = Vec::new();
        for file in &self.files {
            changed.extend(file.reload()?);
        }
        changed.sort();
        changed.dedup();

        let resolved: Vec<(String, String)> = changed
            .iter()
            .filter_map(|key| self.resolve(key).map(|v| (key.clone(), v)))
            .filter(|(key, value)| before.get(key) != Some(value))
            .collect();
        self.observers.record_all(resolved);

        if !changed.is_empty() {
            debug!("Reloaded file sources, {} key(s) changed", changed.len());
        }
        Ok(changed)
    }

    /// Path of the writable primary file.
    pub fn config_file(&self) -> &Path {
        self.primary.path()
    }

    /// Paths of every file source, primary first.
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path().to_path_buf()).collect()
    }

    /// Source kinds and names in precedence order.
    pub fn layers(&self) -> Vec<(SourceKind, String)> {
        self.kinds
            .iter()
            .zip(&self.sources)
            .map(|(kind, source)| (*kind, source.name()))
            .collect()
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        if self.observers.is_empty() {
            return;
        }

        error!(
            "ConfigStore dropped with {} observer holder(s) still registered",
            self.observers.holder_count()
        );
        if !std::thread::panicking() {
            debug_assert!(false, "all observers must be removed before the store is dropped");
        }
    }
}

fn owned_keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::{ConfigLocations, StoreBuilder};
    use crate::config::metadata::{ConfigVariable, ValueType};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .with(
                ConfigVariable::new("Volume", "100")
                    .value_type(ValueType::Int)
                    .min(0.0)
                    .max(200.0),
            )
            .with(ConfigVariable::new("Name", "anon"))
            .with(ConfigVariable::new("Fullscreen", "1").value_type(ValueType::Bool))
    }

    fn open(temp: &TempDir, contents: &str) -> ConfigStore {
        let path = temp.path().join("settings.cfg");
        std::fs::write(&path, contents).unwrap();
        StoreBuilder::new(ConfigLocations::new(path))
            .metadata(registry())
            .build()
            .unwrap()
    }

    #[test]
    fn test_overlay_wins_over_file() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Volume = 50\n");

        store.set_string("Volume", "20", true).unwrap();
        assert_eq!(store.get_string("Volume").unwrap(), "20");
        // The file still holds the persisted value
        assert_eq!(store.primary.get_string("Volume").as_deref(), Some("50"));
    }

    #[test]
    fn test_persistent_write_clears_overlay() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "");

        store.set_string("Volume", "20", true).unwrap();
        store.set_string("Volume", "30", false).unwrap();
        assert!(!store.overlay.is_set("Volume"));
        assert_eq!(store.get_string("Volume").unwrap(), "30");
    }

    #[test]
    fn test_unknown_key_is_error() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "");
        let err = store.get_string("Nope").unwrap_err();
        assert!(err.is_key_error());
        assert!(!store.is_set("Nope"));
    }

    #[test]
    fn test_read_is_clamped() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Volume = 900\n");
        assert_eq!(store.get_string("Volume").unwrap(), "200");
        assert_eq!(store.get_int("Volume").unwrap(), 200);
    }

    #[test]
    fn test_typed_accessors() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Fullscreen = off\n");
        assert!(!store.get_bool("Fullscreen").unwrap());

        store.set("Volume", 75, false).unwrap();
        assert_eq!(store.get_int("Volume").unwrap(), 75);
        assert!(matches!(
            store.get_int("Name"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_write_equal_to_default_deletes() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Volume = 50\n");

        store.set_string("Volume", "100", false).unwrap();
        assert!(!store.primary.is_set("Volume"));
        assert_eq!(store.get_string("Volume").unwrap(), "100");
    }

    #[test]
    fn test_writing_disabled_still_notifies() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "");
        store.set_writing_enabled(false);

        store.set_string("Name", "zed", false).unwrap();
        assert!(!store.primary.is_set("Name"));
        assert_eq!(
            store.pending_changes().get("Name").map(String::as_str),
            Some("zed")
        );
    }

    #[test]
    fn test_delete_hits_overlay_and_files() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Name = bob\n");
        store.set_string("Name", "tmp", true).unwrap();

        store.delete("Name").unwrap();
        assert_eq!(store.get_string("Name").unwrap(), "anon");
        // Only the earlier overlay write is queued
        assert_eq!(
            store.pending_changes().get("Name").map(String::as_str),
            Some("tmp")
        );
    }

    #[test]
    fn test_data_merges_by_precedence() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Name = bob\n");
        store.set_string("Volume", "10", true).unwrap();

        let data = store.data();
        assert_eq!(data["Name"], "bob");
        assert_eq!(data["Volume"], "10");
        assert_eq!(data["Fullscreen"], "1");
    }

    #[test]
    fn test_observer_sees_reload() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Name = bob\n");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = store.add_observer(
            move |k, v| sink.lock().unwrap().push(format!("{k}={v}")),
            &["Name"],
        );

        std::fs::write(store.config_file(), "Name = carol\n").unwrap();
        assert_eq!(store.reload_file_sources().unwrap(), vec!["Name"]);
        store.update();
        assert_eq!(*seen.lock().unwrap(), vec!["Name=carol"]);

        store.remove_observer(token);
    }

    #[test]
    fn test_shadowed_reload_is_silent() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "Name = bob\nVolume = 50\n");
        store.set_string("Name", "ov", true).unwrap();
        store.update();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = store.add_observer(
            move |k, v| sink.lock().unwrap().push(format!("{k}={v}")),
            &["Name", "Volume"],
        );

        std::fs::write(store.config_file(), "Name = carl\nVolume = 60\n").unwrap();
        assert_eq!(
            store.reload_file_sources().unwrap(),
            vec!["Name", "Volume"]
        );
        store.update();
        assert_eq!(*seen.lock().unwrap(), vec!["Volume=60"]);

        store.remove_observer(token);
    }

    #[test]
    fn test_failed_persist_is_io_error() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "");

        // Replace the file with a directory so the next write cannot read it
        std::fs::remove_file(store.config_file()).unwrap();
        std::fs::create_dir(store.config_file()).unwrap();

        let err = store.set_string("Name", "bob", false).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(store.pending_changes().is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "all observers must be removed")]
    fn test_drop_with_observers_asserts() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "");
        let _token = store.add_observer(|_, _| {}, &["Name"]);
        drop(store);
    }

    #[test]
    fn test_layers_order() {
        let temp = TempDir::new().unwrap();
        let store = open(&temp, "");
        let kinds: Vec<SourceKind> = store.layers().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::Overlay, SourceKind::Primary, SourceKind::Defaults]
        );
    }
}
