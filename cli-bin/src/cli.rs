// src/cli.rs
pub mod backup;
pub mod restore;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for commands.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// MMS – backup, restore and retention for the maintenance database
#[derive(Parser, Debug)]
#[command(name = "mms", author, version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    pub format: Format,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full backup: database, documents and (optionally) config.ini
    ///
    /// Example:
    ///     mms create --label end-of-month --include-config
    Create(backup::CreateArgs),

    /// Database-only backup
    CreateDb(backup::CreateDbArgs),

    /// List backups, newest first
    List,

    /// Restore from a backup (a safety backup of the live database is taken first)
    ///
    /// Example:
    ///     mms restore backup_20240102_100000.zip --documents --yes
    Restore(restore::RestoreArgs),

    /// Delete one backup
    Delete {
        /// Backup file name as shown by `mms list`
        id: String,
    },

    /// Keep the N most recent backups and delete the rest
    Cleanup(backup::CleanupArgs),

    /// Run SQLite's integrity check on a backup
    Verify {
        /// Backup file name as shown by `mms list`
        id: String,
    },

    /// Count and size of the backups on disk
    Stats,

    /// Generate shell completions (hidden)
    #[command(hide = true)]
    Completions {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: Shell,
    },
}
