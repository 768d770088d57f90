//! Misc shared helpers.

/// Strip a user-supplied backup label down to characters that are safe in a
/// filename on every platform.
///
/// Whitespace becomes `_`, anything outside `[A-Za-z0-9_-]` is dropped and
/// runs of underscores collapse to one and leading/trailing underscores are
/// trimmed. Returns `None` when nothing usable is left.
pub fn sanitize_label(raw: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            c if c.is_whitespace() => '_',
            _ => continue,
        };
        if c == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(c);
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Human-readable size with two decimals (`512.00 B`, `1.50 KB`, …).
pub fn readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}
