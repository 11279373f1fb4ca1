//! Journal counters
//!
//! Counters only, monotonic, reset on open. Passive: nothing in the journal
//! reads them to make decisions.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by committers, the logger and the installer.
#[derive(Debug, Default)]
pub struct WalStats {
    commits: AtomicU64,
    batches_logged: AtomicU64,
    logger_passes: AtomicU64,
    failed_appends: AtomicU64,
    install_passes: AtomicU64,
    blocks_installed: AtomicU64,
    failed_installs: AtomicU64,
    serialized_reads: AtomicU64,
}

/// Point-in-time copy of `WalStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalStatsSnapshot {
    /// Batches accepted into the in-memory log
    pub commits: u64,
    /// Batches made durable by the logger
    pub batches_logged: u64,
    /// Logger passes that wrote at least one update
    pub logger_passes: u64,
    /// Logger passes whose durable write failed
    pub failed_appends: u64,
    /// Install passes that installed at least one update
    pub install_passes: u64,
    /// Data-region block writes
    pub blocks_installed: u64,
    /// Install passes that failed and were left for retry
    pub failed_installs: u64,
    /// Reads that kept racing installs and fell back to the install lock
    pub serialized_reads: u64,
}

impl WalStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_logger_pass(&self, batches: u64) {
        self.logger_passes.fetch_add(1, Ordering::Relaxed);
        self.batches_logged.fetch_add(batches, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_append(&self) {
        self.failed_appends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_install_pass(&self, blocks: u64) {
        self.install_passes.fetch_add(1, Ordering::Relaxed);
        self.blocks_installed.fetch_add(blocks, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_install(&self) {
        self.failed_installs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_serialized_read(&self) {
        self.serialized_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WalStatsSnapshot {
        WalStatsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            batches_logged: self.batches_logged.load(Ordering::Relaxed),
            logger_passes: self.logger_passes.load(Ordering::Relaxed),
            failed_appends: self.failed_appends.load(Ordering::Relaxed),
            install_passes: self.install_passes.load(Ordering::Relaxed),
            blocks_installed: self.blocks_installed.load(Ordering::Relaxed),
            failed_installs: self.failed_installs.load(Ordering::Relaxed),
            serialized_reads: self.serialized_reads.load(Ordering::Relaxed),
        }
    }
}
