//! Layered configuration store.
//!
//! Resolves keys through an ordered stack of sources (highest precedence first):
//! 1. **Overlay** - volatile in-memory overrides, never persisted
//! 2. **Safemode** - optional hard-coded values forced in safemode
//! 3. **Primary file** - the writable `key = value` file
//! 4. **Additional files** - further files layered beneath the primary
//! 5. **Platform** - optional fixed sources (e.g. headless/dedicated profiles)
//! 6. **Defaults** - declared default of every variable
//!
//! ## Persistence
//! Writes only persist values that differ from what the layers below would
//! supply; writing a value equal to the inherited one deletes the entry
//! instead. On construction, redundant entries already present in the files
//! are removed.
//!
//! ## Change notification
//! Writes are buffered per key (latest value wins) and delivered to registered
//! observers on [`ConfigStore::update`].
//!
//! ## Environment Variables
//! - `LAYERED_CONFIG_FILE` - Config file list, primary first (CLI only)
//! - `LAYERED_CONFIG_SCHEMA` - YAML variable schema (CLI only)

mod defaults;
mod delta;
mod file;
pub mod global;
mod loader;
mod metadata;
mod observers;
mod overlay;
mod source;
mod store;
pub mod watcher;

pub use defaults::{DefaultSource, SafemodeSource, StaticSource};
pub use delta::{RedundantEntry, data_without_defaults, plan_default_removal, remove_defaults};
pub use file::{FileSource, parse_lenient, parse_strict, render};
pub use loader::{ConfigLocations, FILE_ENV, SCHEMA_ENV, SourceKind, StoreBuilder};
pub use metadata::{ClampFn, ConfigVariable, MetadataRegistry, ValueType, parse_bool};
pub use observers::{ObserverCallback, ObserverRegistry, ObserverToken};
pub use overlay::OverlaySource;
pub use source::{ReadSource, StringMap, WriteSource};
pub use store::ConfigStore;
