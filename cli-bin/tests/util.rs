//! tests/util.rs
//! Small helpers shared across integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Absolute path to the freshly-built `mms` binary.
pub fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mms"))
}

pub fn db_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join("data/mms.db")
}

pub fn backups_dir(tmp: &TempDir) -> PathBuf {
    tmp.path().join("backups")
}

pub fn documents(tmp: &TempDir) -> PathBuf {
    tmp.path().join("documents")
}

/// Build a `Command` for `mms` whose database, backup root, documents tree
/// and config file all live under `tmp`.
///
/// Each call yields a brand-new `Command`, so callers can freely add
/// arguments without affecting other invocations.
pub fn mms(tmp: &TempDir) -> Command {
    let mut cmd = Command::new(bin());
    cmd.env("MMS_CONFIG", tmp.path().join("config.ini"))
        .env("MMS_DB_PATH", db_path(tmp))
        .env("MMS_BACKUP_DIR", backups_dir(tmp))
        .env("MMS_DOCUMENT_ROOT", documents(tmp))
        .env_remove("RUST_LOG");
    cmd
}

/// Create a small SQLite database and a documents tree to back up.
pub fn seed(tmp: &TempDir) {
    let db = db_path(tmp);
    fs::create_dir_all(db.parent().unwrap()).unwrap();
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch(
        "CREATE TABLE assets (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO assets (name) VALUES ('pump-7'), ('valve-2');",
    )
    .unwrap();

    let docs = documents(tmp);
    fs::create_dir_all(docs.join("assets")).unwrap();
    fs::write(docs.join("assets/pump-7.pdf"), b"%PDF-1.4").unwrap();
    fs::write(
        tmp.path().join("config.ini"),
        "[Backup]\nkeep_recent = 2\n",
    )
    .unwrap();
}

pub fn add_asset(db: &Path, name: &str) {
    let conn = rusqlite::Connection::open(db).unwrap();
    conn.execute("INSERT INTO assets (name) VALUES (?1)", [name])
        .unwrap();
}

/// Identifiers from `mms list --format json`, newest first.
pub fn listed_ids(tmp: &TempDir) -> Vec<String> {
    let out = mms(tmp)
        .args(["--format", "json", "list"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    v["backups"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["identifier"].as_str().unwrap().to_string())
        .collect()
}
