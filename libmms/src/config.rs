use ini::Ini;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BackupError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "config.ini";
pub const DEFAULT_DB_PATH: &str = "data/maintenance_management.db";
pub const DEFAULT_BACKUP_DIR: &str = "data/backups";
pub const DEFAULT_DOCUMENT_ROOT: &str = "documents";
pub const DEFAULT_KEEP_RECENT: usize = 10;

/// Paths the backup manager works on, resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub config_file: PathBuf,
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
    pub document_root: PathBuf,
    pub keep_recent: usize,
}

impl Config {
    /// Resolve configuration from the environment and the INI file.
    ///
    /// Priority:
    /// 1. `MMS_DB_PATH`, `MMS_BACKUP_DIR`, `MMS_DOCUMENT_ROOT` env-vars
    /// 2. `[Database]`, `[Documents]` and `[Backup]` keys in the config file
    ///    (`MMS_CONFIG`, or `./config.ini`), relative to the file's directory
    /// 3. Built-in defaults under the config file's directory
    pub fn load() -> Result<Self> {
        let config_file = std::env::var_os("MMS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut cfg = Self::from_file(&config_file)?;

        if let Some(p) = std::env::var_os("MMS_DB_PATH") {
            cfg.db_path = PathBuf::from(p);
        }
        if let Some(p) = std::env::var_os("MMS_BACKUP_DIR") {
            cfg.backup_dir = PathBuf::from(p);
        }
        if let Some(p) = std::env::var_os("MMS_DOCUMENT_ROOT") {
            cfg.document_root = PathBuf::from(p);
        }
        Ok(cfg)
    }

    /// Read `config_file` if it exists; a missing file just means defaults.
    pub fn from_file(config_file: &Path) -> Result<Self> {
        let base = crate::fsutil::parent_dir(config_file);
        let mut cfg = Self::with_base(&base, config_file.to_path_buf());

        if !config_file.is_file() {
            debug!(path = %config_file.display(), "no config file, using defaults");
            return Ok(cfg);
        }

        let ini = Ini::load_from_file(config_file)
            .map_err(|e| BackupError::Config(format!("{}: {e}", config_file.display())))?;

        if let Some(p) = ini.get_from(Some("Database"), "database_path") {
            cfg.db_path = base.join(p.trim());
        }
        if let Some(p) = ini.get_from(Some("Database"), "backup_path") {
            cfg.backup_dir = base.join(p.trim());
        }
        if let Some(p) = ini.get_from(Some("Documents"), "document_root") {
            cfg.document_root = base.join(p.trim());
        }
        if let Some(n) = ini.get_from(Some("Backup"), "keep_recent") {
            cfg.keep_recent = n
                .trim()
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| {
                    BackupError::Config(format!(
                        "{}: [Backup] keep_recent must be a positive integer, got {n:?}",
                        config_file.display()
                    ))
                })?;
        }
        Ok(cfg)
    }

    /// Defaults rooted at `base`, ignoring environment and config file. Handy
    /// for tests and headless tools.
    pub fn at<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref();
        Self::with_base(base, base.join(DEFAULT_CONFIG_FILE))
    }

    fn with_base(base: &Path, config_file: PathBuf) -> Self {
        Self {
            config_file,
            db_path: base.join(DEFAULT_DB_PATH),
            backup_dir: base.join(DEFAULT_BACKUP_DIR),
            document_root: base.join(DEFAULT_DOCUMENT_ROOT),
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }
}
