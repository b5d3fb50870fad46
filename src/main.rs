//! layered-config command line tool
//!
//! Reads and edits a stack of `key = value` configuration files resolved
//! against a YAML variable schema.

use anyhow::{Context, Result, bail};
use clap::Parser;
use layered_config::cli::migrate::{MigrateOutcome, run_migrate};
use layered_config::cli::watch::run_watch;
use layered_config::cli::{Cli, Command};
use layered_config::config::{ConfigStore, global};
use layered_config::error::ConfigError;
use layered_config::format::{
    OutputFormat, format_entries, format_layers, format_redundant, format_schema, format_value,
};
use layered_config::logging::{LogTarget, init_logging};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let format = cli.format;
    match &cli.command {
        Command::Schema => {
            let registry = cli.load_schema()?;
            print!("{}", format_schema(&registry, format)?);
        }
        Command::Migrate(args) => {
            match run_migrate(args, cli.store_builder()?)? {
                MigrateOutcome::DryRun(planned) => {
                    print!("{}", format_redundant(&planned, format)?);
                    if !planned.is_empty() {
                        eprintln!("Dry run: no files were modified.");
                    }
                }
                MigrateOutcome::Removed(removed) => {
                    print!("{}", format_redundant(&removed, format)?);
                }
                MigrateOutcome::Cancelled => {}
            }
        }
        command => {
            let store = cli
                .store_builder()?
                .build()
                .context("Failed to open configuration")?;
            let store = global::instantiate(store);
            let result = run_store_command(&store, command, format).await;

            // Release the global slot before the store goes away.
            global::deallocate();
            result?;
        }
    }

    Ok(())
}

async fn run_store_command(store: &ConfigStore, command: &Command, format: OutputFormat) -> Result<()> {
    match command {
        Command::Get { key } => {
            let value = store.get_string(key)?;
            print!("{}", format_value(key, &value, format)?);
        }
        Command::Set { key, value } => {
            if store.is_read_only(key) {
                bail!("{} is read-only", key);
            }
            store
                .set_string(key, value, false)
                .with_context(|| format!("Failed to set {}", key))?;
            let fired = store.update();
            debug!("Set {}, {} observer(s) notified", key, fired);
            print!("{}", format_value(key, &store.get_string(key)?, format)?);
        }
        Command::Delete { key } => {
            if !store.metadata().contains(key) {
                return Err(ConfigError::key_not_registered(key).into());
            }
            store
                .delete(key)
                .with_context(|| format!("Failed to delete {}", key))?;
        }
        Command::List => {
            print!("{}", format_entries(&store.data(), format, "Configuration")?);
        }
        Command::Diff => {
            print!(
                "{}",
                format_entries(&store.data_without_defaults(), format, "Changed from defaults")?
            );
        }
        Command::Sources => {
            print!("{}", format_layers(&store.layers(), format)?);
        }
        Command::Watch(args) => {
            run_watch(store, args, format).await?;
        }
        Command::Schema | Command::Migrate(_) => unreachable!("handled without a store"),
    }
    Ok(())
}
