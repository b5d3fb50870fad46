//! Volatile in-memory source with the highest precedence.

use super::source::{ReadSource, StringMap, WriteSource};
use crate::error::ConfigResult;
use arc_swap::ArcSwap;

/// Ephemeral overrides that are never persisted.
///
/// The map is replaced wholesale on every mutation so readers always see a
/// complete snapshot.
#[derive(Debug)]
pub struct OverlaySource {
    values: ArcSwap<StringMap>,
}

impl OverlaySource {
    pub fn new() -> Self {
        Self {
            values: ArcSwap::from_pointee(StringMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.values.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.load().is_empty()
    }
}

impl Default for OverlaySource {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadSource for OverlaySource {
    fn name(&self) -> String {
        "overlay".to_string()
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
}

impl WriteSource for OverlaySource {
    fn set_string(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.values.rcu(|current| {
            let mut next = StringMap::clone(current);
            next.insert(key.to_string(), value.to_string());
            next
        });
        Ok(())
    }

    fn delete(&self, key: &str) -> ConfigResult<()> {
        if !self.is_set(key) {
            return Ok(());
        }
        self.values.rcu(|current| {
            let mut next = StringMap::clone(current);
            next.remove(key);
            next
        });
        Ok(())
    }
}
