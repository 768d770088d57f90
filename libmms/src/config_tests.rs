// libmms/src/config_tests.rs

use super::config::{Config, DEFAULT_KEEP_RECENT};
use crate::error::BackupError;
use crate::test_utils::ENV_MUTEX;
use std::env;
use std::fs;
use tempfile::tempdir;

fn clear_env() {
    for key in ["MMS_CONFIG", "MMS_DB_PATH", "MMS_BACKUP_DIR", "MMS_DOCUMENT_ROOT"] {
        env::remove_var(key);
    }
}

#[test]
fn defaults_when_file_missing() {
    let tmp = tempdir().unwrap();
    let cfg = Config::from_file(&tmp.path().join("config.ini")).unwrap();
    assert_eq!(cfg, Config::at(tmp.path()));
    assert_eq!(
        cfg.db_path,
        tmp.path().join("data/maintenance_management.db")
    );
    assert_eq!(cfg.backup_dir, tmp.path().join("data/backups"));
    assert_eq!(cfg.document_root, tmp.path().join("documents"));
    assert_eq!(cfg.keep_recent, DEFAULT_KEEP_RECENT);
}

#[test]
fn reads_ini_relative_to_file() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("config.ini");
    fs::write(
        &file,
        "[Application]\napp_title = Maintenance Management System\n\n\
         [Database]\ndatabase_path = db/site.db\nbackup_path = /srv/mms/backups\n\n\
         [Documents]\ndocument_root = files\n\n\
         [Backup]\nkeep_recent = 4\n",
    )
    .unwrap();

    let cfg = Config::from_file(&file).unwrap();
    assert_eq!(cfg.config_file, file);
    assert_eq!(cfg.db_path, tmp.path().join("db/site.db"));
    assert_eq!(cfg.backup_dir, std::path::PathBuf::from("/srv/mms/backups"));
    assert_eq!(cfg.document_root, tmp.path().join("files"));
    assert_eq!(cfg.keep_recent, 4);
}

#[test]
fn rejects_bad_keep_recent() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("config.ini");
    for bad in ["0", "-3", "many"] {
        fs::write(&file, format!("[Backup]\nkeep_recent = {bad}\n")).unwrap();
        let err = Config::from_file(&file).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)), "{bad}");
    }
}

#[test]
fn load_env_override() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("mms.ini");
    fs::write(&file, "[Database]\ndatabase_path = from_file.db\n").unwrap();
    let db = tmp.path().join("custom.db");
    let backups = tmp.path().join("elsewhere");

    env::set_var("MMS_CONFIG", &file);
    env::set_var("MMS_DB_PATH", &db);
    env::set_var("MMS_BACKUP_DIR", &backups);
    let cfg = Config::load().unwrap();
    clear_env();

    assert_eq!(cfg.config_file, file);
    assert_eq!(cfg.db_path, db);
    assert_eq!(cfg.backup_dir, backups);
    assert_eq!(cfg.document_root, tmp.path().join("documents"));
}

#[test]
fn load_reads_config_named_by_env() {
    let _guard = ENV_MUTEX.lock().unwrap();
    clear_env();
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("mms.ini");
    fs::write(&file, "[Documents]\ndocument_root = docs\n").unwrap();

    env::set_var("MMS_CONFIG", &file);
    let cfg = Config::load().unwrap();
    clear_env();

    assert_eq!(cfg.document_root, tmp.path().join("docs"));
    assert_eq!(cfg.db_path, tmp.path().join("data/maintenance_management.db"));
}
