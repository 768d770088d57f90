//! MMS CLI entry-point
//!
//! All heavy lifting lives in the `libmms` crate; this file handles
//! argument parsing, logging and dispatch.

mod cli; // sub-command definitions and argument structs

use libmms::{logging, BackupManager, Config};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use std::{env, io};
use tracing::debug;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    /* ── CLI parsing & logging ────────────────────────────────── */
    let args = Cli::parse();
    if args.verbose {
        env::set_var("RUST_LOG", "debug");
    }
    logging::init();

    /* ── shell-completion shortcut ────────────────────────────── */
    if let Commands::Completions { shell } = &args.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "mms", &mut io::stdout());
        return Ok(());
    }

    /* ── config & manager ─────────────────────────────────────── */
    let cfg = Config::load().context("could not load configuration")?;
    debug!(?cfg, "configuration resolved");
    let manager = BackupManager::from_config(&cfg).with_context(|| {
        format!("could not open backup directory {}", cfg.backup_dir.display())
    })?;

    /* ── command dispatch ─────────────────────────────────────── */
    match &args.command {
        Commands::Completions { .. } => {} // handled above

        Commands::Create(opts) => cli::backup::create(opts, &manager, args.format)?,
        Commands::CreateDb(opts) => cli::backup::create_db(opts, &manager, args.format)?,
        Commands::List => cli::backup::list(&manager, args.format)?,
        Commands::Restore(opts) => cli::restore::run(opts, &manager, args.format)?,
        Commands::Delete { id } => cli::backup::delete(id, &manager, args.format)?,
        Commands::Cleanup(opts) => {
            cli::backup::cleanup(opts, cfg.keep_recent, &manager, args.format)?
        }
        Commands::Verify { id } => cli::backup::verify(id, &manager, args.format)?,
        Commands::Stats => cli::backup::stats(&manager, args.format)?,
    }

    Ok(())
}
