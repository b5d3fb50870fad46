//! Migration command: strip persisted entries that duplicate inherited values.

use crate::config::{RedundantEntry, StoreBuilder};
use anyhow::{Context, Result};
use clap::Args;
use std::io::{BufRead, Write};

/// Arguments for the migrate command.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Perform migration without prompting for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Show what would be removed without making changes.
    #[arg(long)]
    pub dry_run: bool,
}

/// What a migrate run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrateOutcome {
    /// Entries that would be removed; nothing was written.
    DryRun(Vec<RedundantEntry>),
    /// Entries removed from the files.
    Removed(Vec<RedundantEntry>),
    /// The user declined the confirmation prompt.
    Cancelled,
}

/// Run the migration, confirming on stdin unless `--yes` or `--dry-run`.
pub fn run_migrate(args: &MigrateArgs, builder: StoreBuilder) -> Result<MigrateOutcome> {
    run_migrate_with_input(args, builder, &mut std::io::stdin().lock())
}

/// [`run_migrate`] reading the confirmation answer from `input`.
pub fn run_migrate_with_input(
    args: &MigrateArgs,
    builder: StoreBuilder,
    input: &mut impl BufRead,
) -> Result<MigrateOutcome> {
    let store = builder
        .remove_defaults_on_open(false)
        .build()
        .context("Failed to open configuration")?;

    let planned = store.plan_default_removal();
    if args.dry_run {
        return Ok(MigrateOutcome::DryRun(planned));
    }
    if planned.is_empty() {
        return Ok(MigrateOutcome::Removed(planned));
    }

    // Confirm unless --yes
    if !args.yes {
        eprintln!("This will remove {} redundant entries:", planned.len());
        for entry in &planned {
            eprintln!("  {}: {} = {}", entry.source_name, entry.key, entry.value);
        }
        eprint!("Continue? [y/N] ");
        std::io::stderr().flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;

        if !answer.trim().eq_ignore_ascii_case("y") {
            eprintln!("Migration cancelled.");
            return Ok(MigrateOutcome::Cancelled);
        }
    }

    let removed = store
        .remove_defaults()
        .context("Failed to rewrite configuration files")?;
    Ok(MigrateOutcome::Removed(removed))
}
