//! Change observers and the pending-changes buffer.
//!
//! Writes record `key -> newest value` into a pending buffer. [`update`]
//! drains the buffer and calls every callback registered for each changed
//! key, in registration order, with the latest value only.
//!
//! The buffer and both registration tables live behind one mutex, which is
//! held while callbacks run. Callbacks may read configuration but must not
//! write it, register or remove observers, or call `update` again: any of
//! those would deadlock.
//!
//! [`update`]: ObserverRegistry::update

use super::source::StringMap;
use crate::collections::FreeListMap;
use crate::error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Callback invoked with `(key, value)` when an observed key changes.
pub type ObserverCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Handle identifying one observer holder.
///
/// Returned by registration and required for removal. Slots are recycled, so
/// each token also carries a generation; a token from a removed holder never
/// matches a later holder that reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken {
    slot: usize,
    generation: u64,
}

struct Registration {
    callback: ObserverCallback,
    slot: usize,
}

struct Holder {
    generation: u64,
    keys: Vec<String>,
}

#[derive(Default)]
struct ObserverState {
    pending: StringMap,
    by_key: HashMap<String, Vec<Registration>>,
    holders: FreeListMap<Holder>,
    /// Last generation issued for each slot.
    generations: Vec<u64>,
}

impl ObserverState {
    fn is_live(&self, token: ObserverToken) -> bool {
        self.holders
            .get(token.slot)
            .is_some_and(|h| h.generation == token.generation)
    }

    fn subscribe(&mut self, slot: usize, callback: &ObserverCallback, keys: &[String]) {
        for key in keys {
            self.by_key.entry(key.clone()).or_default().push(Registration {
                callback: Arc::clone(callback),
                slot,
            });
            if let Some(holder) = self.holders.get_mut(slot) {
                holder.keys.push(key.clone());
            }
        }
    }
}

/// Observer registry plus pending-changes buffer.
#[derive(Default)]
pub struct ObserverRegistry {
    state: Mutex<ObserverState>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `keys` under a new holder.
    pub fn add(&self, callback: ObserverCallback, keys: &[String]) -> ObserverToken {
        let mut state = self.lock();

        let slot = state.holders.insert(Holder {
            generation: 0,
            keys: Vec::new(),
        });
        let generation = match state.generations.get_mut(slot) {
            Some(g) => {
                *g += 1;
                *g
            }
            None => {
                state.generations.push(1);
                1
            }
        };
        if let Some(holder) = state.holders.get_mut(slot) {
            holder.generation = generation;
        }

        state.subscribe(slot, &callback, keys);
        debug!("Observer {} registered for {} key(s)", slot, keys.len());
        ObserverToken { slot, generation }
    }

    /// Register another callback under an existing holder.
    pub fn add_keys(
        &self,
        token: ObserverToken,
        callback: ObserverCallback,
        keys: &[String],
    ) -> ConfigResult<()> {
        let mut state = self.lock();
        if !state.is_live(token) {
            return Err(ConfigError::StaleObserver);
        }
        state.subscribe(token.slot, &callback, keys);
        Ok(())
    }

    /// Drop every registration of the holder behind `token`.
    ///
    /// Returns `false` (and does nothing) for unknown or stale tokens.
    pub fn remove(&self, token: ObserverToken) -> bool {
        let mut state = self.lock();
        if !state.is_live(token) {
            warn!("Ignoring removal of stale observer token {:?}", token);
            return false;
        }

        let Some(holder) = state.holders.remove(token.slot) else {
            return false;
        };
        for key in &holder.keys {
            if let Some(list) = state.by_key.get_mut(key) {
                list.retain(|r| r.slot != token.slot);
                if list.is_empty() {
                    state.by_key.remove(key);
                }
            }
        }
        debug!("Observer {} removed", token.slot);
        true
    }

    /// Queue `key` as changed. A later write to the same key replaces the value.
    pub fn record(&self, key: &str, value: &str) {
        self.lock().pending.insert(key.to_string(), value.to_string());
    }

    /// Queue several changes at once.
    pub fn record_all(&self, changes: impl IntoIterator<Item = (String, String)>) {
        let mut state = self.lock();
        state.pending.extend(changes);
    }

    /// Drain the pending buffer and notify observers.
    ///
    /// Keys are delivered in sorted order; callbacks for one key fire in
    /// registration order. Returns the number of callbacks invoked.
    pub fn update(&self) -> usize {
        let mut state = self.lock();
        let changed = std::mem::take(&mut state.pending);

        let mut fired = 0;
        for (key, value) in &changed {
            if let Some(list) = state.by_key.get(key) {
                for registration in list {
                    (registration.callback)(key, value);
                    fired += 1;
                }
            }
        }
        fired
    }

    pub fn pending(&self) -> StringMap {
        self.lock().pending.clone()
    }

    /// Number of live holders.
    pub fn holder_count(&self) -> usize {
        self.lock().holders.len()
    }

    /// True when no observer is registered.
    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.by_key.is_empty() && state.holders.is_empty()
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ObserverRegistry")
            .field("holders", &state.holders.len())
            .field("observed_keys", &state.by_key.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
