// src/cli/backup.rs
use crate::cli::Format;
use anyhow::{bail, Context, Result};
use clap::Args;
use libmms::{readable_size, BackupManager, BackupRecord};

/// Options for the `create` command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name prepended to the backup file name
    #[arg(long)]
    pub label: Option<String>,

    /// Leave the documents tree out of the archive
    #[arg(long)]
    pub no_documents: bool,

    /// Include config.ini in the archive
    #[arg(long)]
    pub include_config: bool,
}

/// Options for the `create-db` command
#[derive(Args, Debug)]
pub struct CreateDbArgs {
    /// Name prepended to the backup file name
    #[arg(long)]
    pub label: Option<String>,
}

/// Options for the `cleanup` command
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// How many of the newest backups to keep (defaults to `[Backup] keep_recent`)
    #[arg(long)]
    pub keep: Option<usize>,
}

fn print_record(record: &BackupRecord, fmt: Format) -> Result<()> {
    match fmt {
        Format::Text => println!(
            "Created backup {} ({})",
            record.identifier,
            record.readable_size()
        ),
        Format::Json => println!("{}", serde_json::to_string_pretty(record)?),
    }
    Ok(())
}

pub fn create(args: &CreateArgs, manager: &BackupManager, fmt: Format) -> Result<()> {
    let record = manager
        .create_full_backup(
            args.label.as_deref(),
            args.include_config,
            !args.no_documents,
        )
        .context("full backup failed")?;
    print_record(&record, fmt)
}

pub fn create_db(args: &CreateDbArgs, manager: &BackupManager, fmt: Format) -> Result<()> {
    let record = manager
        .create_database_only_backup(args.label.as_deref())
        .context("database backup failed")?;
    print_record(&record, fmt)
}

pub fn list(manager: &BackupManager, fmt: Format) -> Result<()> {
    match fmt {
        Format::Text => {
            let records = manager.list_backups()?;
            if records.is_empty() {
                eprintln!("No backups in {}", manager.backups_dir().display());
                return Ok(());
            }
            println!("{:<48} {:<14} {:>11}  CREATED", "ID", "TYPE", "SIZE");
            for r in &records {
                println!(
                    "{:<48} {:<14} {:>11}  {}",
                    r.identifier,
                    r.kind.describe(),
                    r.readable_size(),
                    r.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Format::Json => {
            let inventory = manager.inventory()?;
            println!("{}", serde_json::to_string_pretty(&inventory)?);
        }
    }
    Ok(())
}

pub fn delete(id: &str, manager: &BackupManager, fmt: Format) -> Result<()> {
    manager
        .delete_backup(id)
        .with_context(|| format!("could not delete {id}"))?;
    match fmt {
        Format::Text => println!("Deleted backup {id}"),
        Format::Json => println!("{}", serde_json::json!({ "deleted": id })),
    }
    Ok(())
}

pub fn cleanup(
    args: &CleanupArgs,
    default_keep: usize,
    manager: &BackupManager,
    fmt: Format,
) -> Result<()> {
    let keep = args.keep.unwrap_or(default_keep);
    let report = manager.cleanup(keep).context("cleanup failed")?;

    match fmt {
        Format::Text => {
            println!(
                "Deleted {} old backup(s), kept {}",
                report.deleted_count(),
                report.kept.len()
            );
            for f in &report.failed {
                eprintln!("Could not delete {}: {}", f.record.identifier, f.error);
            }
        }
        Format::Json => {
            let failed: Vec<_> = report
                .failed
                .iter()
                .map(|f| serde_json::json!({ "id": f.record.identifier, "error": f.error.to_string() }))
                .collect();
            let out = serde_json::json!({
                "kept": report.kept.iter().map(|r| &r.identifier).collect::<Vec<_>>(),
                "deleted": report.deleted.iter().map(|r| &r.identifier).collect::<Vec<_>>(),
                "failed": failed,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    if !report.failed.is_empty() {
        bail!("{} backup(s) could not be deleted", report.failed.len());
    }
    Ok(())
}

pub fn verify(id: &str, manager: &BackupManager, fmt: Format) -> Result<()> {
    let ok = manager
        .verify_backup(id)
        .with_context(|| format!("could not verify {id}"))?;
    match fmt {
        Format::Text if ok => println!("Backup OK: {id}"),
        Format::Text => println!("Backup corrupted: {id}"),
        Format::Json => println!("{}", serde_json::json!({ "id": id, "ok": ok })),
    }
    if !ok {
        bail!("integrity check failed for {id}");
    }
    Ok(())
}

pub fn stats(manager: &BackupManager, fmt: Format) -> Result<()> {
    let stats = manager.statistics()?;
    match fmt {
        Format::Text => {
            println!("Total backups: {}", stats.total_backups);
            println!("  full:          {}", stats.full_backups);
            println!("  database only: {}", stats.database_only_backups);
            println!(
                "Total size:    {} ({} bytes)",
                readable_size(stats.total_size_bytes),
                stats.total_size_bytes
            );
            let oldest = stats.oldest.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            let newest = stats.newest.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            println!("Oldest:        {}", oldest.as_deref().unwrap_or("-"));
            println!("Newest:        {}", newest.as_deref().unwrap_or("-"));
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
    }
    Ok(())
}
