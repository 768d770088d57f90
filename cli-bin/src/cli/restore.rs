// src/cli/restore.rs
use crate::cli::Format;
use anyhow::{Context, Result};
use clap::Args;
use libmms::{BackupError, BackupManager, RestoreOptions};

/// Options for the `restore` command
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup file name as shown by `mms list`
    pub id: String,

    /// Replace the documents tree with the archived one (full backups only)
    #[arg(long)]
    pub documents: bool,

    /// Replace config.ini with the archived one (full backups only)
    #[arg(long)]
    pub config: bool,

    /// Confirm that the live database may be overwritten
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(args: &RestoreArgs, manager: &BackupManager, fmt: Format) -> Result<()> {
    let options = RestoreOptions {
        restore_documents: args.documents,
        restore_config: args.config,
        confirmed: args.yes,
    };

    if !args.yes {
        eprintln!(
            "Restoring {} overwrites the live database at {}. Re-run with --yes to proceed.",
            args.id,
            manager.live_db_path().display()
        );
    }

    let report = match manager.restore(&args.id, &options) {
        Ok(report) => report,
        Err(e @ BackupError::RestoreFailedUnrecoverable { .. }) => {
            eprintln!("Live data may be inconsistent. Recover manually before using the system.");
            return Err(e).context("restore failed");
        }
        Err(e) => return Err(e).with_context(|| format!("restore of {} failed", args.id)),
    };

    match fmt {
        Format::Text => {
            println!("Restored {} ({})", report.identifier, report.kind.describe());
            if let Some(safety) = &report.safety_backup {
                println!("Safety backup: {safety}");
            }
            if report.documents_restored {
                println!("Documents restored");
            }
            if report.config_restored {
                println!("Config restored");
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
