use std::sync::Mutex;

use lazy_static::lazy_static;

lazy_static! {
    /// Serializes tests that touch `MMS_*` / `RUST_LOG` environment variables.
    pub static ref ENV_MUTEX: Mutex<()> = Mutex::new(());
}
