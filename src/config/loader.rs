//! Store construction.
//!
//! Assembles the source stack in precedence order and runs the one-time
//! default elimination pass over the file sources.

use super::defaults::{DefaultSource, SafemodeSource};
use super::file::FileSource;
use super::metadata::MetadataRegistry;
use super::overlay::OverlaySource;
use super::source::ReadSource;
use super::store::{ConfigStore, StoreParts};
use crate::error::ConfigResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Environment variable listing config files (platform path-list syntax).
pub const FILE_ENV: &str = "LAYERED_CONFIG_FILE";

/// Environment variable naming the YAML metadata schema.
pub const SCHEMA_ENV: &str = "LAYERED_CONFIG_SCHEMA";

/// Role of a source within the stack, highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    /// Volatile overrides, never persisted
    Overlay,
    /// Hard-coded values forced in safemode
    Safemode,
    /// The writable primary file
    Primary,
    /// Additional file layered beneath the primary
    File,
    /// Platform-specific fixed values
    Platform,
    /// Built-in defaults (lowest priority)
    Defaults,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Overlay => write!(f, "overlay"),
            SourceKind::Safemode => write!(f, "safemode"),
            SourceKind::Primary => write!(f, "primary"),
            SourceKind::File => write!(f, "file"),
            SourceKind::Platform => write!(f, "platform"),
            SourceKind::Defaults => write!(f, "defaults"),
        }
    }
}

/// Ordered config file locations. The first one is the writable primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocations {
    primary: PathBuf,
    additional: Vec<PathBuf>,
}

impl ConfigLocations {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            additional: Vec::new(),
        }
    }

    /// Add a file layered beneath those already listed.
    pub fn with_additional(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional.push(path.into());
        self
    }

    /// Build from an ordered list. Returns `None` when the list is empty.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Option<Self> {
        let mut iter = paths.into_iter();
        let primary = iter.next()?;
        Some(Self {
            primary,
            additional: iter.collect(),
        })
    }

    /// Read locations from [`FILE_ENV`].
    pub fn from_env() -> Option<Self> {
        let value = std::env::var_os(FILE_ENV)?;
        Self::from_paths(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()))
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn additional(&self) -> &[PathBuf] {
        &self.additional
    }

    /// All locations, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.primary.as_path()).chain(self.additional.iter().map(PathBuf::as_path))
    }
}

/// Builder for [`ConfigStore`].
#[derive(Debug)]
pub struct StoreBuilder {
    locations: ConfigLocations,
    safemode: bool,
    metadata: Arc<MetadataRegistry>,
    platform_sources: Vec<Arc<dyn ReadSource>>,
    writing_enabled: bool,
    remove_defaults: bool,
}

impl StoreBuilder {
    pub fn new(locations: ConfigLocations) -> Self {
        Self {
            locations,
            safemode: false,
            metadata: Arc::new(MetadataRegistry::new()),
            platform_sources: Vec::new(),
            writing_enabled: true,
            remove_defaults: true,
        }
    }

    /// Insert the safemode source right below the overlay.
    pub fn safemode(mut self, safemode: bool) -> Self {
        self.safemode = safemode;
        self
    }

    /// Variable declarations; their defaults form the lowest source.
    pub fn metadata(mut self, metadata: impl Into<Arc<MetadataRegistry>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Add a fixed source between the file sources and the defaults.
    pub fn platform_source(mut self, source: impl ReadSource + 'static) -> Self {
        self.platform_sources.push(Arc::new(source));
        self
    }

    pub fn writing_enabled(mut self, enabled: bool) -> Self {
        self.writing_enabled = enabled;
        self
    }

    /// Whether to strip redundant file entries while building (default: on).
    pub fn remove_defaults_on_open(mut self, enabled: bool) -> Self {
        self.remove_defaults = enabled;
        self
    }

    /// Open the file sources and assemble the store.
    pub fn build(self) -> ConfigResult<ConfigStore> {
        let mut locations = self.locations.iter();
        if let Some(primary) = locations.next() {
            info!("Using configuration source: \"{}\"", primary.display());
        }
        for extra in locations {
            info!("Using additional configuration source: \"{}\"", extra.display());
        }

        let overlay = Arc::new(OverlaySource::new());
        let primary = Arc::new(FileSource::open(self.locations.primary())?);
        let mut files = vec![Arc::clone(&primary)];

        let mut layers: Vec<(SourceKind, Arc<dyn ReadSource>)> = Vec::new();
        layers.push((SourceKind::Overlay, overlay.clone()));
        if self.safemode {
            info!("Safemode enabled");
            layers.push((
                SourceKind::Safemode,
                Arc::new(SafemodeSource::from_registry(&self.metadata)),
            ));
        }
        layers.push((SourceKind::Primary, primary.clone()));

        for path in self.locations.additional() {
            let file = Arc::new(FileSource::open(path)?);
            files.push(Arc::clone(&file));
            layers.push((SourceKind::File, file));
        }
        for source in self.platform_sources {
            layers.push((SourceKind::Platform, source));
        }
        layers.push((
            SourceKind::Defaults,
            Arc::new(DefaultSource::from_registry(&self.metadata)),
        ));

        let store = ConfigStore::from_parts(StoreParts {
            overlay,
            primary,
            files,
            layers,
            metadata: self.metadata,
            writing_enabled: self.writing_enabled,
        });

        if self.remove_defaults {
            store.remove_defaults()?;
        }
        Ok(store)
    }
}
