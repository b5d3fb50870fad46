//! Structured error types for configuration operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the configuration store and its sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A read hit a key that no source holds. Every readable key must be
    /// declared with a default, so this is a programming error in the caller.
    #[error(
        "key does not exist: {key}\nPlease add the key to the list of allowed configuration values."
    )]
    KeyNotRegistered { key: String },

    /// A resolved value could not be parsed as the requested type.
    #[error("value '{value}' of key {key} is not a valid {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// Reading or persisting a file source failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line in a file source could not be parsed (strict parsing only).
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The variable metadata schema is malformed.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// An observer token was used after its holder was removed.
    #[error("observer token is stale or was never issued")]
    StaleObserver,

    /// The file watcher could not be started.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    pub fn key_not_registered(key: &str) -> Self {
        Self::KeyNotRegistered {
            key: key.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// True for errors caused by the caller using an undeclared key.
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::KeyNotRegistered { .. })
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Schema(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
