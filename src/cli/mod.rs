//! CLI command definitions for layered-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod migrate;
pub mod watch;

use crate::config::{
    ConfigLocations, MetadataRegistry, SCHEMA_ENV, StoreBuilder,
};
use crate::format::OutputFormat;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use migrate::MigrateArgs;
use std::path::PathBuf;
use watch::WatchArgs;

/// Layered configuration store CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file; repeat to layer more files beneath it (the first is written to)
    #[arg(short, long = "file", value_name = "FILE", global = true)]
    pub files: Vec<PathBuf>,

    /// YAML schema declaring variables and their defaults
    #[arg(short, long, value_name = "FILE", global = true)]
    pub schema: Option<PathBuf>,

    /// Force the schema's safemode values
    #[arg(long, global = true)]
    pub safemode: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved value of a key
    Get {
        key: String,
    },

    /// Persist a value (deleted instead if it matches the inherited value)
    Set {
        key: String,
        value: String,
    },

    /// Remove a key from every writable source
    Delete {
        key: String,
    },

    /// Print the merged configuration
    List,

    /// Print persisted values that differ from their defaults
    Diff,

    /// Print the source stack, highest precedence first
    Sources,

    /// Print the declared variables
    Schema,

    /// Remove persisted entries that duplicate their inherited value
    Migrate(MigrateArgs),

    /// Watch the config files and print changes as they happen
    Watch(WatchArgs),
}

impl Cli {
    /// Config file locations from `--file`, falling back to the environment.
    pub fn locations(&self) -> Result<ConfigLocations> {
        if let Some(locations) = ConfigLocations::from_paths(self.files.iter().cloned()) {
            return Ok(locations);
        }
        if let Some(locations) = ConfigLocations::from_env() {
            return Ok(locations);
        }
        bail!(
            "no config file given; pass --file or set {}",
            crate::config::FILE_ENV
        )
    }

    /// Variable declarations from `--schema` or the environment; empty if neither.
    pub fn load_schema(&self) -> Result<MetadataRegistry> {
        let path = self
            .schema
            .clone()
            .or_else(|| std::env::var_os(SCHEMA_ENV).map(PathBuf::from));

        match path {
            Some(path) => MetadataRegistry::load_yaml_file(&path)
                .with_context(|| format!("loading schema {}", path.display())),
            None => Ok(MetadataRegistry::new()),
        }
    }

    /// Store builder configured from the global options.
    pub fn store_builder(&self) -> Result<StoreBuilder> {
        Ok(StoreBuilder::new(self.locations()?)
            .metadata(self.load_schema()?)
            .safemode(self.safemode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_options() {
        let cli = Cli::parse_from([
            "layered-config",
            "--file",
            "user.cfg",
            "-f",
            "site.cfg",
            "--format",
            "json",
            "get",
            "Volume",
        ]);

        assert_eq!(cli.files.len(), 2);
        assert_eq!(cli.format, OutputFormat::Json);
        let locations = cli.locations().unwrap();
        assert_eq!(locations.primary(), std::path::Path::new("user.cfg"));
        assert!(matches!(cli.command, Command::Get { ref key } if key == "Volume"));
    }

    #[test]
    fn test_parse_set_after_subcommand_options() {
        let cli = Cli::parse_from(["layered-config", "set", "Name", "bob", "--safemode"]);
        assert!(cli.safemode);
        assert!(matches!(
            cli.command,
            Command::Set { ref key, ref value } if key == "Name" && value == "bob"
        ));
    }
}
