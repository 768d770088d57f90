//! Full-backup zip layout.
//!
//! ```text
//! database/<db filename>
//! documents/                (present whenever documents were included)
//! documents/<relative path>...
//! config.ini                (only when requested)
//! ```

use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{BackupError, Result};
use crate::fsutil::{pump, transfer};

pub const DATABASE_DIR: &str = "database/";
pub const DOCUMENTS_DIR: &str = "documents/";
pub const CONFIG_ENTRY: &str = "config.ini";

/// What goes into a full backup. `None` leaves the part out entirely.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveSources<'a> {
    pub database: &'a Path,
    pub documents: Option<&'a Path>,
    pub config: Option<&'a Path>,
}

/// Stream the archive into `out`. `dest` is only used to attribute write
/// errors.
pub fn write_archive<W: Write + Seek>(out: W, dest: &Path, sources: &ArchiveSources<'_>) -> Result<W> {
    let zip_err = |e: zip::result::ZipError| BackupError::write_failure(dest, io::Error::other(e));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(out);

    let db_name = sources
        .database
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            BackupError::source_unavailable(
                sources.database,
                io::Error::new(io::ErrorKind::InvalidInput, "database path has no file name"),
            )
        })?;
    let mut db = File::open(sources.database)
        .map_err(|e| BackupError::source_unavailable(sources.database, e))?;
    let db_len = db
        .metadata()
        .map_err(|e| BackupError::source_unavailable(sources.database, e))?
        .len();
    zip.start_file(format!("{DATABASE_DIR}{db_name}"), entry_options(options, db_len))
        .map_err(zip_err)?;
    pump(&mut db, sources.database, &mut zip, dest)?;

    if let Some(root) = sources.documents {
        zip.add_directory(DOCUMENTS_DIR, options).map_err(zip_err)?;
        if root.is_dir() {
            let files = add_documents(&mut zip, root, dest, options)?;
            debug!(files, root = %root.display(), "documents archived");
        } else {
            warn!(root = %root.display(), "documents root missing, archiving an empty tree");
        }
    }

    if let Some(config) = sources.config {
        if config.is_file() {
            let mut input =
                File::open(config).map_err(|e| BackupError::source_unavailable(config, e))?;
            zip.start_file(CONFIG_ENTRY, options).map_err(zip_err)?;
            pump(&mut input, config, &mut zip, dest)?;
        } else {
            warn!(path = %config.display(), "config file requested but not found, skipping");
        }
    }

    zip.finish().map_err(zip_err)
}

fn add_documents<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    root: &Path,
    dest: &Path,
    options: SimpleFileOptions,
) -> Result<usize> {
    let zip_err = |e: zip::result::ZipError| BackupError::write_failure(dest, io::Error::other(e));
    let mut files = 0;

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BackupError::source_unavailable(path, io::Error::from(e))
        })?;
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let name = format!("{DOCUMENTS_DIR}{}", slash_path(rel));
        let ft = entry.file_type();

        if ft.is_dir() {
            zip.add_directory(name, options).map_err(zip_err)?;
        } else if ft.is_file() {
            let mut input = File::open(entry.path())
                .map_err(|e| BackupError::source_unavailable(entry.path(), e))?;
            let len = input
                .metadata()
                .map_err(|e| BackupError::source_unavailable(entry.path(), e))?
                .len();
            zip.start_file(name, entry_options(options, len))
                .map_err(zip_err)?;
            pump(&mut input, entry.path(), zip, dest)?;
            files += 1;
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular file in documents");
        }
    }
    Ok(files)
}

/// Entries at or past 4 GiB need zip64 headers.
fn entry_options(options: SimpleFileOptions, len: u64) -> SimpleFileOptions {
    options.large_file(len >= u64::from(u32::MAX))
}

fn slash_path(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// What an existing archive carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveContents {
    pub database_entry: Option<String>,
    pub has_documents: bool,
    pub has_config: bool,
}

/// Open a full backup for reading. A file that is not a zip is reported as
/// an extraction failure.
pub fn open(path: &Path, identifier: &str) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| BackupError::source_unavailable(path, e))?;
    ZipArchive::new(file).map_err(|e| BackupError::extraction(identifier, e))
}

pub fn inspect<R: Read + Seek>(zip: &ZipArchive<R>) -> ArchiveContents {
    let mut contents = ArchiveContents::default();
    for name in zip.file_names() {
        if let Some(rest) = name.strip_prefix(DATABASE_DIR) {
            if contents.database_entry.is_none() && !rest.is_empty() && !rest.ends_with('/') {
                contents.database_entry = Some(name.to_string());
            }
        } else if name.starts_with(DOCUMENTS_DIR) {
            contents.has_documents = true;
        } else if name == CONFIG_ENTRY {
            contents.has_config = true;
        }
    }
    contents
}

/// Copy one entry into `out`. Decompression and CRC errors count as a corrupt
/// archive.
pub fn extract_entry<R: Read + Seek, W: Write>(
    zip: &mut ZipArchive<R>,
    name: &str,
    identifier: &str,
    out: &mut W,
    dest: &Path,
) -> Result<u64> {
    let mut entry = zip
        .by_name(name)
        .map_err(|e| BackupError::extraction(identifier, format!("{name}: {e}")))?;
    transfer(
        &mut entry,
        out,
        |e| BackupError::extraction(identifier, format!("{name}: {e}")),
        |e| BackupError::write_failure(dest, e),
    )
}

/// Rebuild the archived documents tree under `dest_dir`. Returns the number
/// of files written.
pub fn extract_documents<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    identifier: &str,
    dest_dir: &Path,
) -> Result<usize> {
    fs::create_dir_all(dest_dir).map_err(|e| BackupError::write_failure(dest_dir, e))?;
    let mut files = 0;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| BackupError::extraction(identifier, e))?;
        if !entry.name().starts_with(DOCUMENTS_DIR) {
            continue;
        }
        let unsafe_path = || BackupError::extraction(identifier, format!("unsafe path {}", entry.name()));
        let enclosed = entry.enclosed_name().ok_or_else(unsafe_path)?;
        let rel = enclosed.strip_prefix("documents").map_err(|_| unsafe_path())?;
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(unsafe_path());
        }
        if rel.as_os_str().is_empty() {
            continue;
        }

        let target = dest_dir.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| BackupError::write_failure(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BackupError::write_failure(parent, e))?;
        }
        let name = entry.name().to_string();
        let mut out = File::create(&target).map_err(|e| BackupError::write_failure(&target, e))?;
        transfer(
            &mut entry,
            &mut out,
            |e| BackupError::extraction(identifier, format!("{name}: {e}")),
            |e| BackupError::write_failure(&target, e),
        )?;
        files += 1;
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn build(sources: &ArchiveSources<'_>) -> ZipArchive<Cursor<Vec<u8>>> {
        let out = write_archive(Cursor::new(Vec::new()), Path::new("mem.zip"), sources).unwrap();
        ZipArchive::new(Cursor::new(out.into_inner())).unwrap()
    }

    #[test]
    fn layout_with_everything() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("mms.db");
        fs::write(&db, b"sqlite bytes").unwrap();
        let docs = tmp.path().join("documents");
        fs::create_dir_all(docs.join("assets/pump-7")).unwrap();
        fs::write(docs.join("assets/pump-7/manual.pdf"), b"%PDF").unwrap();
        fs::write(docs.join("readme.txt"), b"hi").unwrap();
        let cfg = tmp.path().join("config.ini");
        fs::write(&cfg, "[Database]\n").unwrap();

        let mut zip = build(&ArchiveSources {
            database: &db,
            documents: Some(&docs),
            config: Some(&cfg),
        });

        let contents = inspect(&zip);
        assert_eq!(contents.database_entry.as_deref(), Some("database/mms.db"));
        assert!(contents.has_documents);
        assert!(contents.has_config);
        assert!(zip.by_name("documents/assets/pump-7/manual.pdf").is_ok());

        let mut db_bytes = Vec::new();
        extract_entry(&mut zip, "database/mms.db", "t", &mut db_bytes, Path::new("x")).unwrap();
        assert_eq!(db_bytes, b"sqlite bytes");
    }

    #[test]
    fn missing_documents_root_still_marks_documents() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("mms.db");
        fs::write(&db, b"db").unwrap();
        let missing = tmp.path().join("nope");
        let missing_cfg = tmp.path().join("absent.ini");

        let zip = build(&ArchiveSources {
            database: &db,
            documents: Some(&missing),
            config: Some(&missing_cfg),
        });

        let contents = inspect(&zip);
        assert!(contents.has_documents);
        assert!(!contents.has_config);
    }

    #[test]
    fn documents_left_out_when_not_requested() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("mms.db");
        fs::write(&db, b"db").unwrap();

        let zip = build(&ArchiveSources {
            database: &db,
            documents: None,
            config: None,
        });

        assert!(!inspect(&zip).has_documents);
    }

    #[test]
    fn database_past_four_gib_is_archived() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("big.db");
        let len = u64::from(u32::MAX) + 4097;
        File::create(&db).unwrap().set_len(len).unwrap();

        let out_path = tmp.path().join("out.zip");
        let out = File::create(&out_path).unwrap();
        write_archive(
            out,
            &out_path,
            &ArchiveSources {
                database: &db,
                documents: None,
                config: None,
            },
        )
        .unwrap();

        let mut zip = open(&out_path, "out.zip").unwrap();
        assert_eq!(inspect(&zip).database_entry.as_deref(), Some("database/big.db"));
        assert_eq!(zip.by_name("database/big.db").unwrap().size(), len);
    }

    #[test]
    fn missing_database_is_source_unavailable() {
        let tmp = tempdir().unwrap();
        let err = write_archive(
            Cursor::new(Vec::new()),
            Path::new("mem.zip"),
            &ArchiveSources {
                database: &tmp.path().join("gone.db"),
                documents: None,
                config: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, BackupError::SourceUnavailable { .. }));
    }

    #[test]
    fn extract_documents_rebuilds_tree() {
        let tmp = tempdir().unwrap();
        let db = tmp.path().join("mms.db");
        fs::write(&db, b"db").unwrap();
        let docs = tmp.path().join("documents");
        fs::create_dir_all(docs.join("a/b")).unwrap();
        fs::create_dir_all(docs.join("empty")).unwrap();
        fs::write(docs.join("a/b/c.txt"), b"deep").unwrap();

        let mut zip = build(&ArchiveSources {
            database: &db,
            documents: Some(&docs),
            config: None,
        });

        let out = tmp.path().join("restored");
        let n = extract_documents(&mut zip, "t", &out).unwrap();
        assert_eq!(n, 1);
        assert_eq!(fs::read(out.join("a/b/c.txt")).unwrap(), b"deep");
        assert!(out.join("empty").is_dir());
    }

    #[test]
    fn extract_documents_rejects_escaping_paths() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("documents/../evil.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"nope").unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let tmp = tempdir().unwrap();
        let err = extract_documents(&mut zip, "evil", &tmp.path().join("out")).unwrap_err();
        assert!(matches!(err, BackupError::ExtractionFailure { .. }));
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn open_rejects_non_zip() {
        let tmp = tempdir().unwrap();
        let bogus = tmp.path().join("backup_20240101_100000.zip");
        fs::write(&bogus, b"definitely not a zip").unwrap();
        let err = open(&bogus, "backup_20240101_100000.zip").unwrap_err();
        assert!(matches!(err, BackupError::ExtractionFailure { .. }));
    }
}
