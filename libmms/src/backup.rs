// libmms/src/backup.rs

use chrono::{Local, NaiveDateTime};
use rusqlite::{ErrorCode, OpenFlags};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveSources};
use crate::config::Config;
use crate::error::{BackupError, Result};
use crate::fsutil;
use crate::naming::{format_name, parse_name, BackupKind, ParsedName};
use crate::utils::{readable_size, sanitize_label};

/// Label carried by the database-only backup taken before every restore.
pub const SAFETY_LABEL: &str = "pre_restore";

/// One artifact in the backup root, as read back from its filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub identifier: String,
    pub kind: BackupKind,
    pub created_at: NaiveDateTime,
    pub sequence: u32,
    pub size_bytes: u64,
    pub label: Option<String>,
    pub path: PathBuf,
}

impl BackupRecord {
    fn from_parsed(identifier: String, parsed: ParsedName, size_bytes: u64, path: PathBuf) -> Self {
        Self {
            identifier,
            kind: parsed.kind,
            created_at: parsed.created_at,
            sequence: parsed.sequence,
            size_bytes,
            label: parsed.label,
            path,
        }
    }

    pub fn is_safety_backup(&self) -> bool {
        self.kind == BackupKind::DatabaseOnly && self.label.as_deref() == Some(SAFETY_LABEL)
    }

    pub fn readable_size(&self) -> String {
        readable_size(self.size_bytes)
    }
}

/// Ordering contract for listings: `created_at` descending, then the `_N`
/// collision counter descending, then identifier ascending. Names are not
/// compared lexically until both keys tie.
fn sort_records(records: &mut [BackupRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.sequence.cmp(&a.sequence))
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}

#[derive(Debug)]
pub struct CleanupFailure {
    pub record: BackupRecord,
    pub error: BackupError,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub kept: Vec<BackupRecord>,
    pub deleted: Vec<BackupRecord>,
    pub failed: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupStatistics {
    pub total_backups: usize,
    pub total_size_bytes: u64,
    pub full_backups: usize,
    pub database_only_backups: usize,
    pub oldest: Option<NaiveDateTime>,
    pub newest: Option<NaiveDateTime>,
}

impl BackupStatistics {
    pub fn from_records(records: &[BackupRecord]) -> Self {
        let mut stats = Self {
            total_backups: records.len(),
            ..Self::default()
        };
        for r in records {
            stats.total_size_bytes += r.size_bytes;
            match r.kind {
                BackupKind::Full => stats.full_backups += 1,
                BackupKind::DatabaseOnly => stats.database_only_backups += 1,
            }
        }
        stats.oldest = records.iter().map(|r| r.created_at).min();
        stats.newest = records.iter().map(|r| r.created_at).max();
        stats
    }

    pub fn total_size(&self) -> String {
        readable_size(self.total_size_bytes)
    }
}

/// Everything worth exporting about the backup root in one serializable
/// value.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInventory {
    pub generated_at: NaiveDateTime,
    pub backup_dir: PathBuf,
    pub database_path: PathBuf,
    pub documents_root: PathBuf,
    pub statistics: BackupStatistics,
    pub backups: Vec<BackupRecord>,
}

#[derive(Debug)]
pub struct BackupManager {
    pub(crate) live_db_path: PathBuf,
    pub(crate) backups_dir: PathBuf,
    pub(crate) documents_root: PathBuf,
    pub(crate) config_file: PathBuf,
}

impl BackupManager {
    pub fn new<P1, P2, P3, P4>(
        live_db_path: P1,
        backups_dir: P2,
        documents_root: P3,
        config_file: P4,
    ) -> Result<Self>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
        P4: AsRef<Path>,
    {
        let backups_dir_path = backups_dir.as_ref().to_path_buf();
        if !backups_dir_path.exists() {
            fs::create_dir_all(&backups_dir_path)
                .map_err(|e| BackupError::write_failure(&backups_dir_path, e))?;
        } else if !backups_dir_path.is_dir() {
            return Err(BackupError::write_failure(
                &backups_dir_path,
                io::Error::other("backups path exists but is not a directory"),
            ));
        }
        Ok(Self {
            live_db_path: live_db_path.as_ref().to_path_buf(),
            backups_dir: backups_dir_path,
            documents_root: documents_root.as_ref().to_path_buf(),
            config_file: config_file.as_ref().to_path_buf(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.db_path,
            &cfg.backup_dir,
            &cfg.document_root,
            &cfg.config_file,
        )
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    pub fn live_db_path(&self) -> &Path {
        &self.live_db_path
    }

    /// Zip the database, and optionally the documents tree and config file,
    /// into `[label_]backup_YYYYMMDD_HHMMSS.zip`.
    pub fn create_full_backup(
        &self,
        label: Option<&str>,
        include_config: bool,
        include_documents: bool,
    ) -> Result<BackupRecord> {
        self.create_full_backup_at(label, include_config, include_documents, now())
    }

    pub(crate) fn create_full_backup_at(
        &self,
        label: Option<&str>,
        include_config: bool,
        include_documents: bool,
        created_at: NaiveDateTime,
    ) -> Result<BackupRecord> {
        let label = label.and_then(sanitize_label);
        if !self.live_db_path.is_file() {
            return Err(BackupError::source_unavailable(
                &self.live_db_path,
                io::Error::new(io::ErrorKind::NotFound, "live database not found"),
            ));
        }

        let mut tmp = fsutil::temp_in(&self.backups_dir)?;
        let tmp_path = tmp.path().to_path_buf();
        let sources = ArchiveSources {
            database: &self.live_db_path,
            documents: include_documents.then_some(self.documents_root.as_path()),
            config: include_config.then_some(self.config_file.as_path()),
        };
        archive::write_archive(tmp.as_file_mut(), &tmp_path, &sources)?;
        fsutil::seal(&mut tmp)?;

        let record = self.publish(tmp, BackupKind::Full, label.as_deref(), created_at)?;
        info!(
            id = %record.identifier,
            size = %record.readable_size(),
            documents = include_documents,
            config = include_config,
            "full backup created"
        );
        Ok(record)
    }

    /// Byte copy of the live database as `[label_]db_backup_YYYYMMDD_HHMMSS.db`.
    pub fn create_database_only_backup(&self, label: Option<&str>) -> Result<BackupRecord> {
        self.create_database_only_backup_at(label, now())
    }

    pub(crate) fn create_database_only_backup_at(
        &self,
        label: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Result<BackupRecord> {
        let label = label.and_then(sanitize_label);
        let tmp = fsutil::copy_to_temp(&self.live_db_path, &self.backups_dir)?;
        let record = self.publish(tmp, BackupKind::DatabaseOnly, label.as_deref(), created_at)?;
        info!(
            id = %record.identifier,
            size = %record.readable_size(),
            "database backup created"
        );
        Ok(record)
    }

    fn publish(
        &self,
        tmp: NamedTempFile,
        kind: BackupKind,
        label: Option<&str>,
        created_at: NaiveDateTime,
    ) -> Result<BackupRecord> {
        let (name, path) = fsutil::publish_unique(tmp, &self.backups_dir, |seq| {
            format_name(kind, label, created_at, seq)
        })?;
        let parsed = parse_name(&name).ok_or_else(|| {
            BackupError::InvalidArgument(format!("generated backup name does not parse: {name}"))
        })?;
        let size = fs::metadata(&path)
            .map_err(|e| BackupError::source_unavailable(&path, e))?
            .len();
        Ok(BackupRecord::from_parsed(name, parsed, size, path))
    }

    /// Every artifact in the backup root, newest first. Anything whose name
    /// does not match a backup pattern is ignored.
    ///
    /// Backups from the same second are ordered by their `_N` counter
    /// (highest first) before falling back to the identifier, so
    /// `db_backup_20240101_120000_1.db` lists ahead of
    /// `db_backup_20240101_120000.db`.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let mut records = Vec::new();

        let entries = match fs::read_dir(&self.backups_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(BackupError::source_unavailable(&self.backups_dir, e)),
        };

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %self.backups_dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(parsed) = parse_name(&name) else {
                continue;
            };

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(id = %name, "backup vanished during scan");
                    continue;
                }
                Err(e) => return Err(BackupError::source_unavailable(&path, e)),
            };
            if !metadata.is_file() {
                continue;
            }
            records.push(BackupRecord::from_parsed(name, parsed, metadata.len(), path));
        }

        sort_records(&mut records);
        Ok(records)
    }

    /// Resolve an identifier to an existing artifact. Only bare filenames
    /// that match a backup pattern are accepted.
    pub fn get_backup(&self, identifier: &str) -> Result<BackupRecord> {
        if Path::new(identifier).file_name() != Some(OsStr::new(identifier)) {
            return Err(BackupError::not_found(identifier));
        }
        let parsed = parse_name(identifier).ok_or_else(|| BackupError::not_found(identifier))?;

        let path = self.backups_dir.join(identifier);
        match fs::metadata(&path) {
            Ok(m) if m.is_file() => Ok(BackupRecord::from_parsed(
                identifier.to_string(),
                parsed,
                m.len(),
                path,
            )),
            Ok(_) => Err(BackupError::not_found(identifier)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackupError::not_found(identifier)),
            Err(e) => Err(BackupError::source_unavailable(&path, e)),
        }
    }

    pub fn latest(&self) -> Result<Option<BackupRecord>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    pub fn delete_backup(&self, identifier: &str) -> Result<()> {
        let record = self.get_backup(identifier)?;
        match fs::remove_file(&record.path) {
            Ok(()) => {
                info!(id = %identifier, "backup deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackupError::not_found(identifier)),
            Err(e) => Err(BackupError::write_failure(&record.path, e)),
        }
    }

    /// Keep the `keep_recent` newest backups and delete the rest. A file that
    /// cannot be removed is reported in [`CleanupReport::failed`] and the pass
    /// carries on.
    pub fn cleanup(&self, keep_recent: usize) -> Result<CleanupReport> {
        self.cleanup_with(keep_recent, |path| fs::remove_file(path))
    }

    pub(crate) fn cleanup_with<F>(&self, keep_recent: usize, mut remove: F) -> Result<CleanupReport>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        if keep_recent == 0 {
            return Err(BackupError::InvalidArgument(
                "keep_recent must be at least 1".to_string(),
            ));
        }

        let mut report = CleanupReport::default();
        for (index, record) in self.list_backups()?.into_iter().enumerate() {
            if index < keep_recent {
                report.kept.push(record);
                continue;
            }
            match remove(&record.path) {
                Ok(()) => {
                    debug!(id = %record.identifier, "old backup removed");
                    report.deleted.push(record);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(id = %record.identifier, "old backup already gone");
                }
                Err(e) => {
                    warn!(id = %record.identifier, error = %e, "could not remove old backup");
                    let error = BackupError::write_failure(&record.path, e);
                    report.failed.push(CleanupFailure { record, error });
                }
            }
        }

        info!(
            kept = report.kept.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "backup cleanup finished"
        );
        Ok(report)
    }

    pub fn statistics(&self) -> Result<BackupStatistics> {
        Ok(BackupStatistics::from_records(&self.list_backups()?))
    }

    pub fn inventory(&self) -> Result<BackupInventory> {
        let backups = self.list_backups()?;
        Ok(BackupInventory {
            generated_at: now(),
            backup_dir: self.backups_dir.clone(),
            database_path: self.live_db_path.clone(),
            documents_root: self.documents_root.clone(),
            statistics: BackupStatistics::from_records(&backups),
            backups,
        })
    }

    /// Run SQLite's integrity check against the backed-up database. A full
    /// backup has its database entry extracted to a scratch file first.
    pub fn verify_backup(&self, identifier: &str) -> Result<bool> {
        let record = self.get_backup(identifier)?;
        match record.kind {
            BackupKind::DatabaseOnly => integrity_ok(&record.path),
            BackupKind::Full => {
                let mut zip = match archive::open(&record.path, identifier) {
                    Ok(zip) => zip,
                    Err(BackupError::ExtractionFailure { reason, .. }) => {
                        warn!(id = %identifier, %reason, "backup archive unreadable");
                        return Ok(false);
                    }
                    Err(e) => return Err(e),
                };
                let Some(entry) = archive::inspect(&zip).database_entry else {
                    warn!(id = %identifier, "backup archive has no database entry");
                    return Ok(false);
                };
                let mut scratch =
                    NamedTempFile::new().map_err(|e| BackupError::write_failure(std::env::temp_dir(), e))?;
                let scratch_path = scratch.path().to_path_buf();
                match archive::extract_entry(&mut zip, &entry, identifier, &mut scratch, &scratch_path) {
                    Ok(_) => {}
                    Err(BackupError::ExtractionFailure { reason, .. }) => {
                        warn!(id = %identifier, %reason, "database entry unreadable");
                        return Ok(false);
                    }
                    Err(e) => return Err(e),
                }
                fsutil::seal(&mut scratch)?;
                integrity_ok(&scratch_path)
            }
        }
    }
}

fn integrity_ok(path: &Path) -> Result<bool> {
    let conn = rusqlite::Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    match conn.query_row("PRAGMA integrity_check", [], |r| r.get::<_, String>(0)) {
        Ok(res) => Ok(res == "ok"),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
