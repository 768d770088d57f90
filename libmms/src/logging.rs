use tracing_subscriber::{fmt, EnvFilter};

/// Initialise global tracing subscriber.
///
/// Reads `RUST_LOG` for filtering, falls back to `info`. Calling it twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Everything goes to stderr so stdout stays parseable (`--format json`).
    let _ = fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
