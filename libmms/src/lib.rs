//! libmms – backup, restore and retention for the Maintenance Management
//! System.
//!
//! Down-stream crates (`cli-bin`, tests) should depend *only* on the items
//! re-exported here, never on internal modules directly.

pub mod archive;
pub mod backup;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod logging;
pub mod naming;
pub mod restore;
pub mod utils;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod test_utils;

use std::path::Path;

pub use backup::{
    BackupInventory, BackupManager, BackupRecord, BackupStatistics, CleanupFailure, CleanupReport,
    SAFETY_LABEL,
};
pub use config::Config;
pub use error::{BackupError, Result};
pub use naming::BackupKind;
pub use restore::{RestoreOptions, RestoreReport};
pub use utils::readable_size;

/// Load configuration from env / `config.ini` and build a manager for it.
pub fn open_default() -> Result<(Config, BackupManager)> {
    let cfg = Config::load()?;
    let manager = BackupManager::from_config(&cfg)?;
    Ok((cfg, manager))
}

/// Manager over the default layout rooted at `base` – handy for tests or
/// headless tools.
pub fn open_at<P: AsRef<Path>>(base: P) -> Result<BackupManager> {
    BackupManager::from_config(&Config::at(base))
}
