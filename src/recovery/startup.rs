//! Recovery startup sequence
//!
//! # Startup Sequence (strict order)
//!
//! 1. Read and validate both log headers
//! 2. Read every live log slot
//! 3. Install the recovered updates into the data region
//! 4. Advance the on-disk `start` to the recovered `end`
//! 5. Hand the log mirror to the journal; it then accepts commits

use tracing::info;

use super::errors::{RecoveryError, RecoveryResult};
use super::replay::{LogReplayer, ReplayStats};
use crate::crash_point::{maybe_crash, points};
use crate::disk::Disk;
use crate::wal::circular::{self, Appender};
use crate::wal::LogLayout;

/// Recovery state after successful startup
#[derive(Debug)]
pub struct RecoveryState {
    /// Geometry read from the end header
    pub layout: LogLayout,
    /// Replay statistics
    pub replay_stats: ReplayStats,
    /// Mirror of the end header for the logger
    pub(crate) appender: Appender,
}

/// Recovery Manager that orchestrates startup
pub struct RecoveryManager<'a> {
    disk: &'a dyn Disk,
}

impl<'a> RecoveryManager<'a> {
    pub fn new(disk: &'a dyn Disk) -> Self {
        Self { disk }
    }

    /// Execute the full recovery sequence.
    ///
    /// Returns a FATAL error on any inconsistency; the journal must not be
    /// opened in that case.
    pub fn recover(&self) -> RecoveryResult<RecoveryState> {
        maybe_crash(points::RECOVERY_START);

        let log = circular::recover(self.disk).map_err(RecoveryError::log_corruption)?;
        let replay_stats = LogReplayer::replay(self.disk, &log)?;

        info!(
            start = replay_stats.start,
            end = replay_stats.end,
            replayed = replay_stats.entries_replayed,
            blocks = replay_stats.blocks_written,
            log_size = log.layout.log_size(),
            "recovery complete"
        );

        Ok(RecoveryState {
            layout: log.layout,
            replay_stats,
            appender: log.appender,
        })
    }
}
