//! Optional process-wide store instance.
//!
//! Prefer passing an `Arc<ConfigStore>` to the code that needs it. This slot
//! exists for code that cannot be handed one; it is filled once at startup and
//! emptied at shutdown.

use super::store::ConfigStore;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

static INSTANCE: ArcSwapOption<ConfigStore> = ArcSwapOption::const_empty();

/// Install `store` as the process-wide instance, replacing any previous one.
pub fn instantiate(store: ConfigStore) -> Arc<ConfigStore> {
    let store = Arc::new(store);
    INSTANCE.store(Some(Arc::clone(&store)));
    store
}

/// The current process-wide instance, if any.
pub fn get() -> Option<Arc<ConfigStore>> {
    INSTANCE.load_full()
}

/// Clear the process-wide slot and return what it held.
///
/// The store itself is dropped once the last outstanding `Arc` goes away.
pub fn deallocate() -> Option<Arc<ConfigStore>> {
    INSTANCE.swap(None)
}
