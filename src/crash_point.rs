//! Crash point injection for testing durability
//!
//! A crash point is enabled via the `BLOCKJOURNAL_CRASH_POINT` environment
//! variable. When the named point is reached the process terminates with
//! `std::process::abort()`: no cleanup, no unwinding, no catching.
//!
//! # Usage
//!
//! ```bash
//! BLOCKJOURNAL_CRASH_POINT=installer_after_data_write blockjournal write ...
//! ```

use std::sync::OnceLock;

/// Cache the crash point name to avoid repeated env var lookups
static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn get_crash_point() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var("BLOCKJOURNAL_CRASH_POINT").ok())
        .as_deref()
}

/// Returns true if `BLOCKJOURNAL_CRASH_POINT` equals the given name.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    get_crash_point().map(|p| p == name).unwrap_or(false)
}

/// Aborts the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] Triggering crash at point: {}", name);
        std::process::abort();
    }
}

/// All defined crash point names
pub mod points {
    // Logger: slots synced, end header not yet written
    pub const LOGGER_BEFORE_END_HEADER: &str = "logger_before_end_header";
    pub const LOGGER_AFTER_END_HEADER: &str = "logger_after_end_header";

    // Installer: data region synced, start header not yet advanced
    pub const INSTALLER_AFTER_DATA_WRITE: &str = "installer_after_data_write";
    pub const INSTALLER_AFTER_START_ADVANCE: &str = "installer_after_start_advance";

    pub const RECOVERY_START: &str = "recovery_start";
    pub const RECOVERY_AFTER_REPLAY: &str = "recovery_after_replay";

    pub fn all() -> &'static [&'static str] {
        &[
            LOGGER_BEFORE_END_HEADER,
            LOGGER_AFTER_END_HEADER,
            INSTALLER_AFTER_DATA_WRITE,
            INSTALLER_AFTER_START_ADVANCE,
            RECOVERY_START,
            RECOVERY_AFTER_REPLAY,
        ]
    }
}
