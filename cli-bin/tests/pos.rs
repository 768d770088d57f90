//! Positive-path integration checks for every sub-command.

mod util;
use util::{add_asset, backups_dir, db_path, documents, listed_ids, mms, seed};

use predicates::{prelude::*, str};
use std::fs;
use tempfile::tempdir;

/* ─────────────────────────── CREATE ──────────────────────────── */

#[test]
fn create_db_then_list_shows_it() {
    let tmp = tempdir().unwrap();
    seed(&tmp);

    mms(&tmp)
        .args(["create-db", "--label", "nightly"])
        .assert()
        .success()
        .stdout(str::contains("Created backup nightly_db_backup_"));

    let ids = listed_ids(&tmp);
    assert_eq!(ids.len(), 1);
    let backup = backups_dir(&tmp).join(&ids[0]);
    assert_eq!(
        fs::metadata(backup).unwrap().len(),
        fs::metadata(db_path(&tmp)).unwrap().len()
    );

    mms(&tmp)
        .arg("list")
        .assert()
        .success()
        .stdout(str::contains("Database Only").and(str::contains(ids[0].as_str())));
}

#[test]
fn create_full_prints_json_record() {
    let tmp = tempdir().unwrap();
    seed(&tmp);

    let out = mms(&tmp)
        .args(["--format", "json", "create", "--include-config"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let record: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(record["kind"], "full");
    let id = record["identifier"].as_str().unwrap();
    assert!(id.starts_with("backup_") && id.ends_with(".zip"), "{id}");
    assert!(backups_dir(&tmp).join(id).is_file());
}

/* ─────────────────────────── RESTORE ─────────────────────────── */

#[test]
fn restore_full_backup_with_documents() {
    let tmp = tempdir().unwrap();
    seed(&tmp);
    let db_then = fs::read(db_path(&tmp)).unwrap();

    mms(&tmp).arg("create").assert().success();
    let id = listed_ids(&tmp).remove(0);

    add_asset(&db_path(&tmp), "compressor-9");
    fs::write(documents(&tmp).join("late.txt"), b"added after backup").unwrap();

    mms(&tmp)
        .args(["restore", &id, "--documents", "--yes"])
        .assert()
        .success()
        .stdout(
            str::contains(format!("Restored {id}"))
                .and(str::contains("Safety backup: pre_restore_db_backup_"))
                .and(str::contains("Documents restored")),
        );

    assert_eq!(fs::read(db_path(&tmp)).unwrap(), db_then);
    assert!(!documents(&tmp).join("late.txt").exists());
    assert!(documents(&tmp).join("assets/pump-7.pdf").exists());
    assert!(listed_ids(&tmp)
        .iter()
        .any(|id| id.starts_with("pre_restore_db_backup_")));
}

/* ──────────────────────── MAINTENANCE ────────────────────────── */

#[test]
fn cleanup_uses_configured_keep_count() {
    let tmp = tempdir().unwrap();
    seed(&tmp);
    for _ in 0..4 {
        mms(&tmp).arg("create-db").assert().success();
    }
    assert_eq!(listed_ids(&tmp).len(), 4);

    // config.ini from `seed` says keep_recent = 2
    mms(&tmp)
        .arg("cleanup")
        .assert()
        .success()
        .stdout(str::contains("Deleted 2 old backup(s), kept 2"));

    mms(&tmp)
        .args(["cleanup", "--keep", "1"])
        .assert()
        .success()
        .stdout(str::contains("Deleted 1 old backup(s), kept 1"));

    mms(&tmp)
        .args(["cleanup", "--keep", "1"])
        .assert()
        .success()
        .stdout(str::contains("Deleted 0 old backup(s)"));
}

#[test]
fn delete_verify_and_stats() {
    let tmp = tempdir().unwrap();
    seed(&tmp);
    mms(&tmp).arg("create-db").assert().success();
    mms(&tmp).arg("create").assert().success();
    let ids = listed_ids(&tmp);
    assert_eq!(ids.len(), 2);

    for id in &ids {
        mms(&tmp)
            .args(["verify", id])
            .assert()
            .success()
            .stdout(str::contains("Backup OK"));
    }

    mms(&tmp)
        .arg("stats")
        .assert()
        .success()
        .stdout(str::contains("Total backups: 2"));

    mms(&tmp)
        .args(["delete", &ids[0]])
        .assert()
        .success()
        .stdout(str::contains(format!("Deleted backup {}", ids[0])));
    assert_eq!(listed_ids(&tmp), vec![ids[1].clone()]);
}

#[test]
fn completions_generate() {
    let tmp = tempdir().unwrap();
    mms(&tmp)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(str::contains("mms"));
}
