//! Default-delta elimination.
//!
//! Walks the stack from lowest to highest precedence, carrying an "effective
//! default" map that starts as the contents of the last (default) source.
//! Non-persistent layers are folded into that map as they are passed. A
//! persistent entry equal to the effective default at its depth is redundant;
//! any other entry becomes the effective default for the sources above it.

use super::source::{ReadSource, StringMap, deletable};
use crate::error::ConfigResult;
use std::sync::Arc;
use tracing::{debug, info};

/// An entry that duplicates the value it would inherit anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantEntry {
    /// Position of the source in the precedence list.
    pub source_index: usize,
    pub source_name: String,
    pub key: String,
    pub value: String,
}

/// Walk the stack and hand every persistent entry to `visit` together with
/// whether it is redundant.
fn walk(
    sources: &[Arc<dyn ReadSource>],
    mut visit: impl FnMut(usize, &dyn ReadSource, String, String, bool),
) {
    let Some(lowest) = sources.last() else {
        return;
    };
    let mut defaults: StringMap = lowest.data();

    for (index, source) in sources.iter().enumerate().rev() {
        if deletable(source.as_ref()).is_none() {
            // Fixed layers (platform, safemode) are inherited like any other
            defaults.extend(source.data());
            continue;
        }

        for (key, value) in source.data() {
            let redundant = defaults.get(&key) == Some(&value);
            if !redundant {
                defaults.insert(key.clone(), value.clone());
            }
            visit(index, source.as_ref(), key, value, redundant);
        }
    }
}

/// Compute the entries [`remove_defaults`] would delete, without mutating.
pub fn plan_default_removal(sources: &[Arc<dyn ReadSource>]) -> Vec<RedundantEntry> {
    let mut planned = Vec::new();
    walk(sources, |source_index, source, key, value, redundant| {
        if redundant {
            planned.push(RedundantEntry {
                source_index,
                source_name: source.name(),
                key,
                value,
            });
        }
    });
    planned
}

/// Delete every redundant entry from the persistent sources.
///
/// Idempotent: a second run finds nothing to delete.
pub fn remove_defaults(sources: &[Arc<dyn ReadSource>]) -> ConfigResult<Vec<RedundantEntry>> {
    let planned = plan_default_removal(sources);

    for entry in &planned {
        if let Some(writable) = deletable(sources[entry.source_index].as_ref()) {
            debug!(
                "Removing {} = {} from {} (matches inherited value)",
                entry.key, entry.value, entry.source_name
            );
            writable.delete(&entry.key)?;
        }
    }

    if !planned.is_empty() {
        info!("Removed {} redundant configuration entries", planned.len());
    }
    Ok(planned)
}

/// Persistent entries that differ from what they would inherit, merged with
/// higher-precedence sources winning.
pub fn data_without_defaults(sources: &[Arc<dyn ReadSource>]) -> StringMap {
    let mut clean = StringMap::new();
    walk(sources, |_, _, key, value, redundant| {
        if !redundant {
            clean.insert(key, value);
        }
    });
    clean
}
