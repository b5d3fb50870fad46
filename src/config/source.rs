//! Source capabilities.
//!
//! Sources come in two tiers. Every source can be read; some can also be
//! written and have keys deleted. The store never inspects concrete types:
//! it asks a source for its writable view and whether it is persistent.

use crate::error::ConfigResult;
use std::collections::BTreeMap;
use std::fmt;

/// Key/value snapshot returned by sources. Sorted so iteration is stable.
pub type StringMap = BTreeMap<String, String>;

/// Read capability shared by every source.
pub trait ReadSource: Send + Sync + fmt::Debug {
    /// Human-readable name for logging.
    fn name(&self) -> String;

    fn is_set(&self, key: &str) -> bool;

    /// The raw value for `key`, if this source holds it.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Snapshot of every key/value pair held by this source.
    fn data(&self) -> StringMap;

    /// The read-write view of this source, if it supports mutation.
    fn as_writable(&self) -> Option<&dyn WriteSource> {
        None
    }

    /// Whether this source is backed by durable storage.
    ///
    /// Only persistent, writable sources take part in default elimination.
    fn is_persistent(&self) -> bool {
        false
    }
}

/// Write capability for sources that accept mutation.
pub trait WriteSource: ReadSource {
    fn set_string(&self, key: &str, value: &str) -> ConfigResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> ConfigResult<()>;
}

/// A source that may have keys deleted during default elimination.
pub(crate) fn deletable(source: &dyn ReadSource) -> Option<&dyn WriteSource> {
    if source.is_persistent() {
        source.as_writable()
    } else {
        None
    }
}
