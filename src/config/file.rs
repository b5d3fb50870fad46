//! File-backed persistent source.
//!
//! Files hold one `key = value` pair per line. Blank lines and lines starting
//! with `#` or `;` are ignored. Keys and values are trimmed.

use super::source::{ReadSource, StringMap, WriteSource};
use crate::error::{ConfigError, ConfigResult};
use arc_swap::ArcSwap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A persistent read-write source backed by a text file.
///
/// Every mutation re-reads the file (another process may have edited it),
/// applies the change and atomically replaces the file. The in-memory map is
/// swapped in one step, so concurrent readers never observe a partial update.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    values: ArcSwap<StringMap>,
    write_lock: Mutex<()>,
}

impl FileSource {
    /// Open the file at `path`. A missing file yields an empty source.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let values = read_file(&path)?;
        debug!("Loaded {} entries from {}", values.len(), path.display());

        Ok(Self {
            path,
            values: ArcSwap::from_pointee(values),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and return the keys whose value was added, changed
    /// or removed since the last load.
    pub fn reload(&self) -> ConfigResult<Vec<String>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let fresh = read_file(&self.path)?;
        let old = self.values.load_full();

        let mut changed: Vec<String> = fresh
            .iter()
            .filter(|(k, v)| old.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(old.keys().filter(|k| !fresh.contains_key(*k)).cloned());
        changed.sort();

        self.values.store(fresh.into());
        Ok(changed)
    }

    /// Apply `edit` to the on-disk contents and persist the result.
    ///
    /// `edit` returns whether it changed anything; unchanged maps are not
    /// written back but still refresh the in-memory view.
    fn modify(&self, edit: impl FnOnce(&mut StringMap) -> bool) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut current = read_file(&self.path)?;

        if edit(&mut current) {
            write_file(&self.path, &current)?;
        }
        self.values.store(current.into());
        Ok(())
    }
}

impl ReadSource for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn is_set(&self, key: &str) -> bool {
        self.values.load().contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.values.load().get(key).cloned()
    }

    fn data(&self) -> StringMap {
        StringMap::clone(&self.values.load())
    }

    fn as_writable(&self) -> Option<&dyn WriteSource> {
        Some(self)
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

impl WriteSource for FileSource {
    fn set_string(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.modify(|map| {
            if map.get(key).map(String::as_str) == Some(value) {
                return false;
            }
            map.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn delete(&self, key: &str) -> ConfigResult<()> {
        self.modify(|map| map.remove(key).is_some())
    }
}

/// Split a line into a key/value pair, or describe why it is malformed.
/// Returns `Ok(None)` for blank and comment lines.
fn parse_line(line: &str) -> Result<Option<(String, String)>, &'static str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return Ok(None);
    }

    let (key, value) = line.split_once('=').ok_or("missing '='")?;
    let key = key.trim();
    if key.is_empty() {
        return Err("empty key");
    }
    Ok(Some((key.to_string(), value.trim().to_string())))
}

/// Parse file contents, skipping malformed lines with a warning.
pub fn parse_lenient(text: &str, path: &Path) -> StringMap {
    let mut map = StringMap::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(Some((key, value))) => {
                map.insert(key, value);
            }
            Ok(None) => {}
            Err(reason) => {
                warn!("{}:{}: skipping line ({})", path.display(), idx + 1, reason);
            }
        }
    }
    map
}

/// Parse file contents, failing on the first malformed line.
pub fn parse_strict(text: &str, path: &Path) -> ConfigResult<StringMap> {
    let mut map = StringMap::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some((key, value)) =
            parse_line(line).map_err(|reason| ConfigError::parse(path, idx + 1, reason))?
        {
            map.insert(key, value);
        }
    }
    Ok(map)
}

/// Render a map in file syntax, sorted by key.
pub fn render(map: &StringMap) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

fn read_file(path: &Path) -> ConfigResult<StringMap> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_lenient(&text, path)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(StringMap::new()),
        Err(e) => Err(ConfigError::io(path, e)),
    }
}

fn write_file(path: &Path, map: &StringMap) -> ConfigResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, render(map)).map_err(|e| ConfigError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| ConfigError::io(path, e))
}
