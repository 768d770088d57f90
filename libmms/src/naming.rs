//! Backup artifact filenames.
//!
//! The filename is the only metadata store, so this module is the wire
//! format other tooling globs for:
//!
//! ```text
//! [label_]backup_YYYYMMDD_HHMMSS[_N].zip      full backup
//! [label_]db_backup_YYYYMMDD_HHMMSS[_N].db    database-only backup
//! ```
//!
//! `_N` only appears when two backups of the same kind and label land in the
//! same second.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const KEYWORD: &str = "backup";
const DB_MARKER: &str = "db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Zip archive: database, optional documents tree, optional config.
    Full,
    /// Raw copy of the database file.
    DatabaseOnly,
}

impl BackupKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Full => "zip",
            Self::DatabaseOnly => "db",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Full => "Full Backup",
            Self::DatabaseOnly => "Database Only",
        }
    }
}

/// Everything a backup filename encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub kind: BackupKind,
    pub label: Option<String>,
    pub created_at: NaiveDateTime,
    pub sequence: u32,
}

/// Build the canonical filename. `label` must already be sanitized.
pub fn format_name(
    kind: BackupKind,
    label: Option<&str>,
    created_at: NaiveDateTime,
    sequence: u32,
) -> String {
    let mut name = String::new();
    if let Some(label) = label {
        name.push_str(label);
        name.push('_');
    }
    if kind == BackupKind::DatabaseOnly {
        name.push_str(DB_MARKER);
        name.push('_');
    }
    name.push_str(KEYWORD);
    name.push('_');
    let _ = write!(name, "{}", created_at.format(TIMESTAMP_FORMAT));
    if sequence > 0 {
        let _ = write!(name, "_{sequence}");
    }
    name.push('.');
    name.push_str(kind.extension());
    name
}

/// Parse a filename produced by [`format_name`] (or copied in by hand with
/// the same shape). Anything else yields `None`.
pub fn parse_name(name: &str) -> Option<ParsedName> {
    let (stem, kind) = if let Some(stem) = name.strip_suffix(".zip") {
        (stem, BackupKind::Full)
    } else if let Some(stem) = name.strip_suffix(".db") {
        (stem, BackupKind::DatabaseOnly)
    } else {
        return None;
    };

    let tokens: Vec<&str> = stem.split('_').collect();
    let (keyword_at, created_at, sequence) = locate_stamp(&tokens)?;

    let mut label_tokens = &tokens[..keyword_at];
    if kind == BackupKind::DatabaseOnly {
        match label_tokens.split_last() {
            Some((last, rest)) if *last == DB_MARKER => label_tokens = rest,
            _ => return None,
        }
    }

    if !label_tokens.iter().all(|t| is_label_token(t)) {
        return None;
    }
    let label = if label_tokens.is_empty() {
        None
    } else {
        Some(label_tokens.join("_"))
    };

    Some(ParsedName {
        kind,
        label,
        created_at,
        sequence,
    })
}

/// Find `backup_<date>_<time>[_<n>]` at the end of the token list.
fn locate_stamp(tokens: &[&str]) -> Option<(usize, NaiveDateTime, u32)> {
    let n = tokens.len();

    if n >= 3 && tokens[n - 3] == KEYWORD {
        if let Some(ts) = parse_stamp(tokens[n - 2], tokens[n - 1]) {
            return Some((n - 3, ts, 0));
        }
    }

    if n >= 4 && tokens[n - 4] == KEYWORD {
        let ts = parse_stamp(tokens[n - 3], tokens[n - 2])?;
        let seq = parse_sequence(tokens[n - 1])?;
        return Some((n - 4, ts, seq));
    }

    None
}

fn parse_stamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let all_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(date, 8) || !all_digits(time, 6) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{date}_{time}"), TIMESTAMP_FORMAT).ok()
}

fn parse_sequence(token: &str) -> Option<u32> {
    if token.is_empty() || token.starts_with('0') || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn is_label_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
