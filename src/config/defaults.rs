//! Read-only sources with fixed contents.

use super::metadata::MetadataRegistry;
use super::source::{ReadSource, StringMap};

/// A named, immutable key/value map.
///
/// Used for platform-specific overrides (e.g. a "dedicated" or "headless"
/// profile) layered between the file sources and the defaults.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    values: StringMap,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, values: StringMap) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build from `(key, value)` pairs.
    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            name,
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl ReadSource for StaticSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_set(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn data(&self) -> StringMap {
        self.values.clone()
    }
}

/// Built-in default values; always the lowest-precedence source.
#[derive(Debug, Clone)]
pub struct DefaultSource(StaticSource);

impl DefaultSource {
    pub fn new(values: StringMap) -> Self {
        Self(StaticSource::new("defaults", values))
    }

    pub fn from_registry(registry: &MetadataRegistry) -> Self {
        Self::new(registry.defaults())
    }
}

impl ReadSource for DefaultSource {
    fn name(&self) -> String {
        self.0.name()
    }

    fn is_set(&self, key: &str) -> bool {
        self.0.is_set(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.0.get_string(key)
    }

    fn data(&self) -> StringMap {
        self.0.data()
    }
}

/// Hard-coded values forced while running in safemode.
///
/// Sits directly below the overlay, above every file source, so it wins over
/// whatever the user has persisted.
#[derive(Debug, Clone)]
pub struct SafemodeSource(StaticSource);

impl SafemodeSource {
    pub fn new(values: StringMap) -> Self {
        Self(StaticSource::new("safemode", values))
    }

    pub fn from_registry(registry: &MetadataRegistry) -> Self {
        Self::new(registry.safemode_values())
    }
}

impl ReadSource for SafemodeSource {
    fn name(&self) -> String {
        self.0.name()
    }

    fn is_set(&self, key: &str) -> bool {
        self.0.is_set(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.0.get_string(key)
    }

    fn data(&self) -> StringMap {
        self.0.data()
    }
}
