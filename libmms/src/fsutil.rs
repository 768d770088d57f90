//! File helpers that never leave a half-written file at a final path.
//!
//! Everything is written to a hidden temp file in the destination directory
//! first (same filesystem, so the final rename is atomic) and only then moved
//! into place.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::{BackupError, Result};

const TEMP_PREFIX: &str = ".mms-";
const TEMP_SUFFIX: &str = ".partial";

/// Upper bound on `_N` suffixes tried before giving up on a unique name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Directory a file lives in, treating a bare filename as `.`.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Hidden temp file inside `dir`. Dropped without being persisted, it is
/// deleted again.
pub fn temp_in(dir: &Path) -> Result<NamedTempFile> {
    fs::create_dir_all(dir).map_err(|e| BackupError::write_failure(dir, e))?;
    Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| BackupError::write_failure(dir, e))
}

/// Copy `reader` into `writer`, blaming read errors on `src` and write
/// errors on `dest`.
pub fn pump<R: Read, W: Write>(
    reader: &mut R,
    src: &Path,
    writer: &mut W,
    dest: &Path,
) -> Result<u64> {
    transfer(
        reader,
        writer,
        |e| BackupError::source_unavailable(src, e),
        |e| BackupError::write_failure(dest, e),
    )
}

/// Chunked copy with caller-chosen error mapping for each side.
pub fn transfer<R, W, FR, FW>(reader: &mut R, writer: &mut W, on_read: FR, on_write: FW) -> Result<u64>
where
    R: Read,
    W: Write,
    FR: Fn(io::Error) -> BackupError,
    FW: Fn(io::Error) -> BackupError,
{
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(on_read(e)),
        };
        writer.write_all(&buf[..n]).map_err(&on_write)?;
        total += n as u64;
    }
    Ok(total)
}

/// Flush and fsync a temp file before it is renamed into place.
pub fn seal(tmp: &mut NamedTempFile) -> Result<()> {
    let path = tmp.path().to_path_buf();
    tmp.flush()
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| BackupError::write_failure(path, e))
}

/// Open `src` and copy it into a fresh temp file in `dir`.
pub fn copy_to_temp(src: &Path, dir: &Path) -> Result<NamedTempFile> {
    let mut input = File::open(src).map_err(|e| BackupError::source_unavailable(src, e))?;
    let mut tmp = temp_in(dir)?;
    let tmp_path = tmp.path().to_path_buf();
    pump(&mut input, src, &mut tmp, &tmp_path)?;
    seal(&mut tmp)?;
    Ok(tmp)
}

/// Rename a sealed temp file over `dest`, replacing whatever is there.
pub fn replace_file(tmp: NamedTempFile, dest: &Path) -> Result<()> {
    tmp.persist(dest)
        .map(|_| ())
        .map_err(|e| BackupError::write_failure(dest, e.error))
}

/// Replace `dest` with a byte copy of `src` without ever exposing a
/// truncated `dest`.
pub fn copy_atomic(src: &Path, dest: &Path) -> Result<()> {
    let tmp = copy_to_temp(src, &parent_dir(dest))?;
    replace_file(tmp, dest)
}

/// Publish a sealed temp file under the first free name `name_for(0)`,
/// `name_for(1)`, … in `dir`. Never overwrites an existing file, so two
/// writers racing for the same second both succeed with distinct names.
pub fn publish_unique<F>(mut tmp: NamedTempFile, dir: &Path, name_for: F) -> Result<(String, PathBuf)>
where
    F: Fn(u32) -> String,
{
    for sequence in 0..MAX_NAME_ATTEMPTS {
        let name = name_for(sequence);
        let target = dir.join(&name);
        match tmp.persist_noclobber(&target) {
            Ok(_) => return Ok((name, target)),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(name = %name, "backup name taken, trying next suffix");
                tmp = e.file;
            }
            Err(e) => return Err(BackupError::write_failure(target, e.error)),
        }
    }
    Err(BackupError::write_failure(
        dir,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free backup filename for this second",
        ),
    ))
}

/// A directory that was swapped in for `live`, with the previous tree kept
/// aside until the caller decides.
#[derive(Debug)]
pub struct DirSwap {
    live: PathBuf,
    aside: Option<PathBuf>,
}

impl DirSwap {
    /// Keep the new tree and delete the previous one (best effort).
    pub fn commit(self) {
        if let Some(aside) = &self.aside {
            if let Err(e) = fs::remove_dir_all(aside) {
                warn!(path = %aside.display(), error = %e, "could not remove previous tree");
            }
        }
    }

    /// Put the previous tree back where it was.
    pub fn revert(self) -> Result<()> {
        if self.live.exists() {
            fs::remove_dir_all(&self.live).map_err(|e| BackupError::write_failure(&self.live, e))?;
        }
        if let Some(aside) = &self.aside {
            fs::rename(aside, &self.live).map_err(|e| BackupError::write_failure(&self.live, e))?;
        }
        Ok(())
    }
}

/// Move `live` aside and rename `staged` into its place. Both must be on the
/// same filesystem.
pub fn swap_dir(staged: &Path, live: &Path) -> Result<DirSwap> {
    let aside = if live.exists() {
        let name = live
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tree".to_string());
        let aside = parent_dir(live).join(format!(
            ".{name}.previous-{}",
            Local::now().format("%Y%m%d%H%M%S%f")
        ));
        fs::rename(live, &aside).map_err(|e| BackupError::write_failure(live, e))?;
        Some(aside)
    } else {
        None
    };

    if let Err(e) = fs::rename(staged, live) {
        if let Some(aside) = &aside {
            if let Err(undo) = fs::rename(aside, live) {
                warn!(path = %aside.display(), error = %undo, "could not move previous tree back");
            }
        }
        return Err(BackupError::write_failure(live, e));
    }

    Ok(DirSwap {
        live: live.to_path_buf(),
        aside,
    })
}
