//! Integration tests for the layered configuration store.
//!
//! Each test builds a store over real files in a temporary directory, so
//! persistence is checked by reading the files back or by reopening a fresh
//! store over the same paths.

use layered_config::config::{
    ConfigLocations, ConfigStore, ConfigVariable, MetadataRegistry, SourceKind, StaticSource,
    StoreBuilder, ValueType, global,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn registry() -> MetadataRegistry {
    MetadataRegistry::new()
        .with(
            ConfigVariable::new("Volume", "100")
                .value_type(ValueType::Int)
                .min(0.0)
                .max(200.0)
                .safemode("10"),
        )
        .with(ConfigVariable::new("Name", "anon"))
        .with(ConfigVariable::new("Version", "3").read_only(true))
}

/// Write `contents` to `name` inside `temp` and return the path.
fn write_file(temp: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = temp.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn open(path: &Path) -> ConfigStore {
    StoreBuilder::new(ConfigLocations::new(path))
        .metadata(registry())
        .build()
        .expect("Failed to open store")
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

/// Records every notification as `key=value`.
fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str, &str) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |k: &str, v: &str| {
        sink.lock().unwrap().push(format!("{}={}", k, v))
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn test_overlay_takes_precedence_over_file() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\nVolume = 50\n");
    let store = open(&path);

    store.set_string("Name", "carol", true).unwrap();
    store.set_string("Volume", "75", true).unwrap();

    assert_eq!(store.get_string("Name").unwrap(), "carol");
    assert_eq!(store.get_int("Volume").unwrap(), 75);
    // File still holds the persisted values
    assert!(read(&path).contains("Name = bob"));
    assert!(read(&path).contains("Volume = 50"));
}

#[test]
fn test_unregistered_key_fails() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Stray = 1\n");
    let store = open(&path);

    let err = store.get_string("Missing").unwrap_err();
    assert!(err.is_key_error());
    assert!(err.to_string().contains("Missing"));
}

#[test]
fn test_values_are_clamped_on_read() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Volume = 900\n");
    let store = open(&path);

    assert_eq!(store.get_string("Volume").unwrap(), "200");
    // Raw value is left alone on disk
    assert_eq!(read(&path), "Volume = 900\n");
}

#[test]
fn test_missing_file_reads_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("user.cfg");
    let store = open(&path);

    assert_eq!(store.get_string("Name").unwrap(), "anon");
    assert_eq!(store.get_int("Volume").unwrap(), 100);
    assert!(!path.exists());

    store.set_string("Name", "dora", false).unwrap();
    assert_eq!(read(&path), "Name = dora\n");
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[test]
fn test_repeated_write_notifies_once() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "");
    let store = open(&path);
    let (seen, callback) = recorder();
    let token = store.add_observer(callback, &["Name"]);

    store.set_string("Name", "eve", false).unwrap();
    store.set_string("Name", "eve", false).unwrap();

    assert_eq!(store.get_string("Name").unwrap(), "eve");
    assert_eq!(store.update(), 1);
    assert_eq!(*seen.lock().unwrap(), vec!["Name=eve"]);

    // Nothing pending after the drain
    assert_eq!(store.update(), 0);
    store.remove_observer(token);
}

#[test]
fn test_end_to_end_volume_example() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Volume = 50\n");
    let store = open(&path);
    let (seen, callback) = recorder();
    let token = store.add_observer(callback, &["Volume"]);

    assert_eq!(store.get_string("Volume").unwrap(), "50");

    store.set_string("Volume", "100", false).unwrap();
    assert!(!read(&path).contains("Volume"));
    assert_eq!(store.get_string("Volume").unwrap(), "100");

    store.update();
    assert_eq!(*seen.lock().unwrap(), vec!["Volume=100"]);
    store.remove_observer(token);
}

#[test]
fn test_overlay_write_does_not_survive_restart() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\n");

    {
        let store = open(&path);
        store.set_string("Name", "ghost", true).unwrap();
        store.set_string("Volume", "42", false).unwrap();
        assert_eq!(store.get_string("Name").unwrap(), "ghost");
    }

    let reopened = open(&path);
    assert_eq!(reopened.get_string("Name").unwrap(), "bob");
    assert_eq!(reopened.get_string("Volume").unwrap(), "42");
}

#[test]
fn test_typed_set_round_trips() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "");
    let store = open(&path);

    store.set("Volume", 64, false).unwrap();
    assert_eq!(store.get::<u32>("Volume").unwrap(), 64);
    assert_eq!(read(&path), "Volume = 64\n");
}

#[test]
fn test_writing_disabled_keeps_files_untouched() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\n");
    let store = StoreBuilder::new(ConfigLocations::new(&path))
        .metadata(registry())
        .writing_enabled(false)
        .build()
        .unwrap();

    store.set_string("Name", "zed", false).unwrap();
    assert_eq!(read(&path), "Name = bob\n");
    assert_eq!(store.pending_changes().get("Name").map(String::as_str), Some("zed"));
}

#[test]
fn test_write_checks_only_nearest_lower_source() {
    let temp = TempDir::new().unwrap();
    let primary = write_file(&temp, "user.cfg", "Volume = 50\n");
    let site = write_file(&temp, "site.cfg", "Volume = 70\n");
    let store = StoreBuilder::new(ConfigLocations::new(&primary).with_additional(&site))
        .metadata(registry())
        .build()
        .unwrap();

    // Equal to the site override: dropped from the primary file
    store.set_string("Volume", "70", false).unwrap();
    assert!(!read(&primary).contains("Volume"));
    assert_eq!(store.get_string("Volume").unwrap(), "70");

    // Equal to the default but shadowed by the site override: stored
    store.set_string("Volume", "100", false).unwrap();
    assert_eq!(read(&primary), "Volume = 100\n");
    assert_eq!(read(&site), "Volume = 70\n");
}

// ---------------------------------------------------------------------------
// Default elimination
// ---------------------------------------------------------------------------

#[test]
fn test_remove_defaults_strips_redundant_entries() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\nVolume = 100\n");
    let store = StoreBuilder::new(ConfigLocations::new(&path))
        .metadata(registry())
        .remove_defaults_on_open(false)
        .build()
        .unwrap();

    assert_eq!(store.plan_default_removal().len(), 1);
    let removed = store.remove_defaults().unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].key, "Volume");
    assert_eq!(read(&path), "Name = bob\n");
    assert_eq!(store.get_string("Volume").unwrap(), "100");

    // Second pass finds nothing
    assert!(store.remove_defaults().unwrap().is_empty());
}

#[test]
fn test_open_migrates_every_file() {
    let temp = TempDir::new().unwrap();
    let primary = write_file(&temp, "user.cfg", "Volume = 70\nName = anon\n");
    let site = write_file(&temp, "site.cfg", "Volume = 70\n");

    let store = StoreBuilder::new(ConfigLocations::new(&primary).with_additional(&site))
        .metadata(registry())
        .build()
        .unwrap();

    // Primary duplicated the site override and the default name
    assert_eq!(read(&primary), "");
    assert_eq!(read(&site), "Volume = 70\n");
    assert_eq!(store.get_string("Volume").unwrap(), "70");
    assert_eq!(store.get_string("Name").unwrap(), "anon");
}

#[test]
fn test_data_without_defaults_is_read_only() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\nVolume = 100\n");
    let store = StoreBuilder::new(ConfigLocations::new(&path))
        .metadata(registry())
        .remove_defaults_on_open(false)
        .build()
        .unwrap();

    let clean = store.data_without_defaults();
    assert_eq!(clean.len(), 1);
    assert_eq!(clean.get("Name").map(String::as_str), Some("bob"));
    // Nothing rewritten
    assert!(read(&path).contains("Volume = 100"));
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

#[test]
fn test_safemode_overrides_files() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Volume = 150\n");
    let store = StoreBuilder::new(ConfigLocations::new(&path))
        .metadata(registry())
        .safemode(true)
        .build()
        .unwrap();

    assert_eq!(store.get_string("Volume").unwrap(), "10");
    // Overlay still wins over safemode
    store.set_string("Volume", "20", true).unwrap();
    assert_eq!(store.get_string("Volume").unwrap(), "20");
}

#[test]
fn test_platform_source_sits_above_defaults() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "");
    let store = StoreBuilder::new(ConfigLocations::new(&path))
        .metadata(registry())
        .platform_source(StaticSource::from_pairs("headless", [("Volume", "0")]))
        .build()
        .unwrap();

    assert_eq!(store.get_string("Volume").unwrap(), "0");

    let kinds: Vec<SourceKind> = store.layers().into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        kinds,
        vec![
            SourceKind::Overlay,
            SourceKind::Primary,
            SourceKind::Platform,
            SourceKind::Defaults
        ]
    );
}

#[test]
fn test_open_keeps_entries_overriding_platform() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Volume = 100\nName = anon\n");
    let store = StoreBuilder::new(ConfigLocations::new(&path))
        .metadata(registry())
        .platform_source(StaticSource::from_pairs("headless", [("Volume", "0")]))
        .build()
        .unwrap();

    // Volume restores the default over the platform value; Name is redundant
    assert_eq!(read(&path), "Volume = 100\n");
    assert_eq!(store.get_string("Volume").unwrap(), "100");
    assert_eq!(store.data_without_defaults().len(), 1);

    // Writing the platform value drops the entry again
    store.set_string("Volume", "0", false).unwrap();
    assert_eq!(read(&path), "");
    assert_eq!(store.get_string("Volume").unwrap(), "0");
}

#[test]
fn test_read_only_flag_is_reported() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "");
    let store = open(&path);

    assert!(store.is_read_only("Version"));
    assert!(!store.is_read_only("Name"));
    assert!(!store.is_read_only("Unknown"));
}

#[test]
fn test_external_edit_reaches_observers() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\n");
    let store = open(&path);
    let (seen, callback) = recorder();
    let token = store.add_observer(callback, &["Name", "Volume"]);

    fs::write(&path, "Name = bob\nVolume = 5\n").unwrap();
    let changed = store.reload_file_sources().unwrap();

    assert_eq!(changed, vec!["Volume"]);
    store.update();
    assert_eq!(*seen.lock().unwrap(), vec!["Volume=5"]);
    store.remove_observer(token);
}

#[test]
fn test_global_instance_lifecycle() {
    let temp = TempDir::new().unwrap();
    let path = write_file(&temp, "user.cfg", "Name = bob\n");

    let store = global::instantiate(open(&path));
    let shared = global::get().expect("instance installed");
    assert!(Arc::ptr_eq(&store, &shared));
    assert_eq!(shared.get_string("Name").unwrap(), "bob");

    assert!(global::deallocate().is_some());
    assert!(global::get().is_none());
}
