//! Installer: drains the durable prefix of the log into the data region
//!
//! One pass:
//!
//! 1. under the metadata lock, take `target = disk_end` and copy
//!    `[mem_start, target)`
//! 2. without the lock, merge the copy over the data region, write every
//!    resolved block, barrier
//! 3. advance the on-disk `start` to `target` (write + barrier)
//! 4. under the lock, trim the in-memory log and wake space waiters
//!
//! A failure anywhere before step 3 leaves `start` where it was; the next
//! pass re-installs the same prefix, which is idempotent.

use tracing::{debug, warn};

use super::circular;
use super::engine::Shared;
use super::errors::{WalError, WalResult};
use super::record::{LogPosition, Update};
use crate::block::Block;
use crate::buf::{merge_updates, BlockSource};
use crate::crash_point::{maybe_crash, points};
use crate::disk::{Disk, DiskResult};

/// The data region as a merge base.
pub(crate) struct DataRegion<'a>(pub(crate) &'a dyn Disk);

impl BlockSource for DataRegion<'_> {
    fn read_block(&self, blkno: u64) -> DiskResult<Block> {
        self.0.read(blkno)
    }
}

impl Shared {
    /// One install pass. Returns the number of data blocks written.
    pub(super) fn install_pass(&self) -> WalResult<u64> {
        let _pass = self.install_lock.lock();

        let (start, target, updates) = {
            let mut st = self.state.lock();
            let start = st.memlog.start();
            let target = st.disk_end;
            if target <= start {
                return Ok(0);
            }
            st.install_started_to = st.install_started_to.max(target);
            (start, target, st.memlog.slice(start, target))
        };

        let blocks = match self.write_prefix(&updates, target) {
            Ok(n) => n,
            Err(e) => {
                self.stats.record_failed_install();
                warn!(error = %e, start, target, "install pass failed; will retry");
                return Err(e);
            }
        };

        self.state.lock().memlog.trim_to(target);
        self.space.notify_all();
        self.stats.record_install_pass(blocks);
        debug!(start, target, blocks, "installed log prefix");
        Ok(blocks)
    }

    fn write_prefix(&self, updates: &[Update], target: LogPosition) -> WalResult<u64> {
        let merged = merge_updates(updates, &DataRegion(&*self.disk))
            .map_err(|e| WalError::install_failed("Failed to read install base", e))?;
        for (blkno, blk) in &merged {
            self.disk.write(*blkno, blk).map_err(|e| {
                WalError::install_failed(format!("Failed to install block {}", blkno), e)
            })?;
        }
        self.disk
            .barrier()
            .map_err(|e| WalError::install_failed("Barrier after install failed", e))?;
        maybe_crash(points::INSTALLER_AFTER_DATA_WRITE);

        circular::write_start(&*self.disk, target)
            .map_err(|e| WalError::install_failed("Failed to advance log start", e))?;
        maybe_crash(points::INSTALLER_AFTER_START_ADVANCE);
        Ok(merged.len() as u64)
    }

    pub(super) fn installer_loop(&self) {
        let interval = self.config.install_interval();
        loop {
            {
                let mut st = self.state.lock();
                if !st.install_requested && !st.shutdown {
                    self.installer_cv.wait_for(&mut st, interval);
                }
                if st.shutdown {
                    break;
                }
                st.install_requested = false;
            }
            // errors are logged inside; the next pass retries
            let _ = self.install_pass();
        }
        debug!("installer stopped");
    }
}
