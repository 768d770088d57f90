//! Restore with a pre-restore safety backup and rollback.
//!
//! Every confirmed restore first copies the live database into a
//! `pre_restore` database-only backup. All archive content is then extracted
//! next to its destination before anything live is replaced, so a corrupt
//! archive fails while the live files are still intact. If a replacement step
//! fails, the safety backup is copied back and a swapped documents tree is
//! moved back into place.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::{debug, error, info, warn};

use crate::archive::{self, CONFIG_ENTRY};
use crate::backup::{BackupManager, BackupRecord, SAFETY_LABEL};
use crate::error::{BackupError, Result};
use crate::fsutil::{self, DirSwap};
use crate::naming::BackupKind;

/// What to bring back besides the database. Nothing happens unless
/// `confirmed` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    pub restore_documents: bool,
    pub restore_config: bool,
    pub confirmed: bool,
}

impl RestoreOptions {
    pub fn confirmed() -> Self {
        Self {
            confirmed: true,
            ..Self::default()
        }
    }

    pub fn with_documents(mut self, yes: bool) -> Self {
        self.restore_documents = yes;
        self
    }

    pub fn with_config(mut self, yes: bool) -> Self {
        self.restore_config = yes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub identifier: String,
    pub kind: BackupKind,
    /// `None` when there was no live database to protect.
    pub safety_backup: Option<String>,
    pub database_restored: bool,
    pub documents_restored: bool,
    pub config_restored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    SafetyBackup,
    Extracting,
    ReplacingDatabase,
    ReplacingDocuments,
    ReplacingConfig,
    RollingBack,
    Done,
}

fn enter(identifier: &str, phase: RestorePhase) {
    debug!(id = %identifier, ?phase, "restore phase");
}

/// Extracted content waiting to replace the live files.
struct Staged {
    database: NamedTempFile,
    documents: Option<(TempDir, PathBuf)>,
    config: Option<NamedTempFile>,
}

impl BackupManager {
    /// Restore the live database (and optionally documents and config) from
    /// a backup.
    ///
    /// Fails with [`BackupError::ConfirmationRequired`] before touching the
    /// filesystem unless `options.confirmed` is set.
    pub fn restore(&self, identifier: &str, options: &RestoreOptions) -> Result<RestoreReport> {
        if !options.confirmed {
            return Err(BackupError::ConfirmationRequired {
                identifier: identifier.to_string(),
            });
        }
        let record = self.get_backup(identifier)?;
        info!(id = %identifier, kind = ?record.kind, "restore started");

        enter(identifier, RestorePhase::SafetyBackup);
        let safety = if self.live_db_path.exists() {
            let safety = self
                .create_database_only_backup(Some(SAFETY_LABEL))
                .map_err(|e| BackupError::SafetyBackupFailed {
                    source: Box::new(e),
                })?;
            Some(safety)
        } else {
            warn!(
                path = %self.live_db_path.display(),
                "no live database to protect, restoring without safety backup"
            );
            None
        };

        let mut report = RestoreReport {
            identifier: record.identifier.clone(),
            kind: record.kind,
            safety_backup: safety.as_ref().map(|s| s.identifier.clone()),
            database_restored: false,
            documents_restored: false,
            config_restored: false,
        };
        let mut swap = None;

        match self.apply(&record, options, &mut report, &mut swap) {
            Ok(()) => {
                if let Some(swap) = swap {
                    swap.commit();
                }
                enter(identifier, RestorePhase::Done);
                info!(
                    id = %identifier,
                    documents = report.documents_restored,
                    config = report.config_restored,
                    "restore finished"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(id = %identifier, error = %err, "restore failed, rolling back");
                enter(identifier, RestorePhase::RollingBack);
                let safety_backup = report.safety_backup.clone();
                match roll_back(
                    &self.live_db_path,
                    safety.as_ref(),
                    report.database_restored,
                    swap,
                ) {
                    Ok(()) => {
                        info!(id = %identifier, "rollback complete");
                        Err(BackupError::RestoreFailedRolledBack {
                            identifier: identifier.to_string(),
                            safety_backup,
                            source: Box::new(err),
                        })
                    }
                    Err(rollback) => {
                        error!(
                            id = %identifier,
                            error = %rollback,
                            "rollback failed, manual recovery needed"
                        );
                        Err(BackupError::RestoreFailedUnrecoverable {
                            identifier: identifier.to_string(),
                            safety_backup,
                            source: Box::new(err),
                            rollback: Box::new(rollback),
                        })
                    }
                }
            }
        }
    }

    fn apply(
        &self,
        record: &BackupRecord,
        options: &RestoreOptions,
        report: &mut RestoreReport,
        swap: &mut Option<DirSwap>,
    ) -> Result<()> {
        let id = record.identifier.as_str();

        if record.kind == BackupKind::DatabaseOnly {
            enter(id, RestorePhase::ReplacingDatabase);
            fsutil::copy_atomic(&record.path, &self.live_db_path)?;
            report.database_restored = true;
            return Ok(());
        }

        enter(id, RestorePhase::Extracting);
        let staged = self.stage(record, options)?;

        enter(id, RestorePhase::ReplacingDatabase);
        fsutil::replace_file(staged.database, &self.live_db_path)?;
        report.database_restored = true;

        if let Some((_staging, tree)) = staged.documents {
            enter(id, RestorePhase::ReplacingDocuments);
            *swap = Some(fsutil::swap_dir(&tree, &self.documents_root)?);
            report.documents_restored = true;
        }

        if let Some(config) = staged.config {
            enter(id, RestorePhase::ReplacingConfig);
            fsutil::replace_file(config, &self.config_file)?;
            report.config_restored = true;
        }
        Ok(())
    }

    fn stage(&self, record: &BackupRecord, options: &RestoreOptions) -> Result<Staged> {
        let id = record.identifier.as_str();
        let mut zip = archive::open(&record.path, id)?;
        let contents = archive::inspect(&zip);

        let entry = contents
            .database_entry
            .ok_or_else(|| BackupError::extraction(id, "archive has no database entry"))?;
        let mut db = fsutil::temp_in(&fsutil::parent_dir(&self.live_db_path))?;
        let db_tmp = db.path().to_path_buf();
        archive::extract_entry(&mut zip, &entry, id, &mut db, &db_tmp)?;
        fsutil::seal(&mut db)?;

        let documents = if options.restore_documents && contents.has_documents {
            let parent = fsutil::parent_dir(&self.documents_root);
            fs::create_dir_all(&parent).map_err(|e| BackupError::write_failure(&parent, e))?;
            let staging = Builder::new()
                .prefix(".mms-restore-")
                .tempdir_in(&parent)
                .map_err(|e| BackupError::write_failure(&parent, e))?;
            let tree = staging.path().join("tree");
            let files = archive::extract_documents(&mut zip, id, &tree)?;
            debug!(id = %id, files, "documents staged");
            Some((staging, tree))
        } else {
            if options.restore_documents {
                warn!(id = %id, "backup has no documents, leaving documents untouched");
            }
            None
        };

        let config = if options.restore_config && contents.has_config {
            let mut cfg = fsutil::temp_in(&fsutil::parent_dir(&self.config_file))?;
            let cfg_tmp = cfg.path().to_path_buf();
            archive::extract_entry(&mut zip, CONFIG_ENTRY, id, &mut cfg, &cfg_tmp)?;
            fsutil::seal(&mut cfg)?;
            Some(cfg)
        } else {
            if options.restore_config {
                warn!(id = %id, "backup has no config file, leaving config untouched");
            }
            None
        };

        Ok(Staged {
            database: db,
            documents,
            config,
        })
    }
}

/// Put the pre-restore state back. Every step is attempted; the first
/// failure is returned.
fn roll_back(
    live_db: &Path,
    safety: Option<&BackupRecord>,
    db_replaced: bool,
    swap: Option<DirSwap>,
) -> Result<()> {
    let mut first_err = None;

    if let Some(swap) = swap {
        if let Err(e) = swap.revert() {
            error!(error = %e, "could not restore previous documents tree");
            first_err = Some(e);
        }
    }

    match safety {
        Some(safety) => {
            if let Err(e) = fsutil::copy_atomic(&safety.path, live_db) {
                error!(error = %e, safety = %safety.identifier, "could not copy safety backup back");
                first_err.get_or_insert(e);
            }
        }
        None if db_replaced => {
            if let Err(e) = fs::remove_file(live_db) {
                let e = BackupError::write_failure(live_db, e);
                error!(error = %e, "could not remove restored database");
                first_err.get_or_insert(e);
            }
        }
        None => {}
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
