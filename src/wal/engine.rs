//! The journal object
//!
//! `Wal` owns the in-memory log, the logger thread and the installer
//! thread. Committers append batches under the metadata lock and, when
//! asked to, wait for the logger to make them durable. The metadata lock
//! (`Shared::state`) is never held across device I/O.
//!
//! Log positions satisfy `mem_start <= disk_end <= mem_end` at all times:
//!
//! - `[mem_start, disk_end)` is durable in the circular region
//! - `[disk_end, mem_end)` is committed but not yet durable
//! - everything below `mem_start` is installed in the data region

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::circular::{self, Appender, LogLayout};
use super::config::JournalConfig;
use super::errors::{WalError, WalResult};
use super::installer::DataRegion;
use super::memlog::MemLog;
use super::record::{LogBatch, LogPosition, Update};
use super::stats::{WalStats, WalStatsSnapshot};
use crate::block::Block;
use crate::buf::merge_updates;
use crate::disk::Disk;
use crate::recovery::{RecoveryError, RecoveryManager, RecoveryResult, ReplayStats};

/// Optimistic attempts a read makes before waiting out installs.
const READ_RETRIES: usize = 3;

/// Bookkeeping guarded by the metadata lock.
#[derive(Debug)]
pub(super) struct WalState {
    pub(super) memlog: MemLog,
    /// Durable end of the circular log
    pub(super) disk_end: LogPosition,
    /// End positions of batches not yet durable, oldest first
    pub(super) pending_batches: Vec<LogPosition>,
    /// Bumped each time a failed log write discards the non-durable tail
    pub(super) generation: u64,
    /// `rollback_ends[g]` is `disk_end` at the rollback that ended generation `g`
    pub(super) rollback_ends: Vec<LogPosition>,
    /// Highest target of any install pass that has started writing
    pub(super) install_started_to: LogPosition,
    /// The log header could not be restored after a failed append
    pub(super) poisoned: bool,
    pub(super) shutdown: bool,
    pub(super) logger_requested: bool,
    pub(super) install_requested: bool,
}

impl WalState {
    fn check_open(&self) -> WalResult<()> {
        if self.poisoned {
            return Err(WalError::device_failed(
                "Log header could not be restored after a failed append",
            ));
        }
        if self.shutdown {
            return Err(WalError::closed());
        }
        Ok(())
    }
}

/// State shared between callers, the logger and the installer.
pub(super) struct Shared {
    pub(super) disk: Arc<dyn Disk>,
    pub(super) config: JournalConfig,
    pub(super) layout: LogLayout,
    pub(super) state: Mutex<WalState>,
    /// `disk_end` advanced or a rollback happened
    pub(super) durable: Condvar,
    /// The in-memory log shrank
    pub(super) space: Condvar,
    pub(super) logger_cv: Condvar,
    pub(super) installer_cv: Condvar,
    /// Serializes appends to the circular region
    pub(super) appender: Mutex<Appender>,
    /// Serializes install passes, and reads that keep racing them
    pub(super) install_lock: Mutex<()>,
    pub(super) stats: WalStats,
}

impl Shared {
    pub(super) fn request_logger(&self, st: &mut WalState) {
        st.logger_requested = true;
        self.logger_cv.notify_one();
    }

    pub(super) fn request_install(&self, st: &mut WalState) {
        st.install_requested = true;
        self.installer_cv.notify_one();
    }

    fn install_threshold(&self) -> u64 {
        self.config
            .install_threshold
            .min(self.layout.log_size())
            .max(1)
    }

    fn validate(&self, batch: &[Update]) -> WalResult<()> {
        let data_start = self.layout.data_start();
        let size = self.disk.size();
        for u in batch {
            if !u.addr.is_valid() {
                return Err(WalError::invalid_address(format!(
                    "Bit range {} does not fit in a block",
                    u.addr
                )));
            }
            if u.addr.blkno < data_start || u.addr.blkno >= size {
                return Err(WalError::invalid_address(format!(
                    "Block {} outside data region [{}, {})",
                    u.addr.blkno, data_start, size
                )));
            }
        }
        Ok(())
    }

    /// Blocks until the batch ending at `end`, appended in `generation`,
    /// is durable or has been rolled back.
    fn wait_durable(
        &self,
        mut st: MutexGuard<'_, WalState>,
        generation: u64,
        end: LogPosition,
    ) -> WalResult<()> {
        loop {
            if st.generation != generation {
                let kept = st
                    .rollback_ends
                    .get(generation as usize)
                    .copied()
                    .unwrap_or(0);
                if end <= kept {
                    return Ok(());
                }
                return Err(WalError::append_failed(format!(
                    "Batch ending at position {} was discarded after a failed log write",
                    end
                )));
            }
            if st.disk_end >= end {
                return Ok(());
            }
            self.request_logger(&mut st);
            self.durable.wait(&mut st);
        }
    }
}

struct Workers {
    logger: JoinHandle<()>,
    installer: JoinHandle<()>,
}

/// Write-ahead log over a block device.
pub struct Wal {
    shared: Arc<Shared>,
    workers: Mutex<Option<Workers>>,
    recovery: ReplayStats,
}

impl Wal {
    /// Writes empty log headers for `config.log_size` slots. Data blocks
    /// are left untouched.
    pub fn format(disk: &dyn Disk, config: &JournalConfig) -> WalResult<()> {
        config
            .validate()
            .map_err(|e| WalError::invalid_config(e.to_string()))?;
        let layout = LogLayout::new(config.log_size);
        if layout.data_start() >= disk.size() {
            return Err(WalError::invalid_config(format!(
                "Device of {} blocks cannot hold a {}-slot log and a data region",
                disk.size(),
                config.log_size
            )));
        }
        circular::format(disk, layout)
            .map_err(|e| WalError::append_io("Failed to write log headers", e))?;
        info!(log_size = config.log_size, data_start = layout.data_start(), "formatted journal");
        Ok(())
    }

    /// Recovers the journal on `disk` and starts the logger and installer.
    ///
    /// Every durable batch is installed before this returns.
    pub fn open(disk: Arc<dyn Disk>, config: JournalConfig) -> RecoveryResult<Wal> {
        config.validate().map_err(|e| {
            RecoveryError::recovery_failed(format!("Invalid journal config: {}", e))
        })?;
        let recovered = RecoveryManager::new(&*disk).recover()?;
        let layout = recovered.layout;
        let end = recovered.replay_stats.end;

        let shared = Arc::new(Shared {
            disk,
            config,
            layout,
            state: Mutex::new(WalState {
                memlog: MemLog::new(end),
                disk_end: end,
                pending_batches: Vec::new(),
                generation: 0,
                rollback_ends: Vec::new(),
                install_started_to: end,
                poisoned: false,
                shutdown: false,
                logger_requested: false,
                install_requested: false,
            }),
            durable: Condvar::new(),
            space: Condvar::new(),
            logger_cv: Condvar::new(),
            installer_cv: Condvar::new(),
            appender: Mutex::new(recovered.appender),
            install_lock: Mutex::new(()),
            stats: WalStats::new(),
        });

        let logger = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.logger_loop())
        };
        let installer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.installer_loop())
        };

        Ok(Wal {
            shared,
            workers: Mutex::new(Some(Workers { logger, installer })),
            recovery: recovered.replay_stats,
        })
    }

    pub fn layout(&self) -> LogLayout {
        self.shared.layout
    }

    /// First block of the data region.
    pub fn data_start(&self) -> u64 {
        self.shared.layout.data_start()
    }

    /// Number of blocks on the underlying device.
    pub fn disk_size(&self) -> u64 {
        self.shared.disk.size()
    }

    pub fn config(&self) -> &JournalConfig {
        &self.shared.config
    }

    /// What recovery did when this journal was opened.
    pub fn recovery_stats(&self) -> &ReplayStats {
        &self.recovery
    }

    pub fn stats(&self) -> WalStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Durable end of the log.
    pub fn disk_end(&self) -> LogPosition {
        self.shared.state.lock().disk_end
    }

    /// End of the log, durable or not.
    pub fn mem_end(&self) -> LogPosition {
        self.shared.state.lock().memlog.end()
    }

    /// Number of logged updates not yet installed.
    pub fn pending(&self) -> u64 {
        self.shared.state.lock().memlog.len()
    }

    /// Current value of `blkno`: the installed block with every committed
    /// update still in the log folded over it.
    pub fn read(&self, blkno: u64) -> WalResult<Block> {
        let shared = &self.shared;
        if blkno < shared.layout.data_start() || blkno >= shared.disk.size() {
            return Err(WalError::invalid_address(format!(
                "Block {} outside data region [{}, {})",
                blkno,
                shared.layout.data_start(),
                shared.disk.size()
            )));
        }
        for _ in 0..READ_RETRIES {
            match self.read_resolved(blkno)? {
                // An install past our snapshot may have raced the base read.
                (_, Some(snap_end)) if shared.state.lock().install_started_to > snap_end => {
                    continue
                }
                (blk, _) => return Ok(blk),
            }
        }

        let _pass = shared.install_lock.lock();
        shared.stats.record_serialized_read();
        debug!(blkno, "read serialized behind installs");
        Ok(self.read_resolved(blkno)?.0)
    }

    /// Folds the logged updates for `blkno` over the data region.
    ///
    /// Also returns the log end of the snapshot when the result depends on
    /// the installed base block.
    fn read_resolved(&self, blkno: u64) -> WalResult<(Block, Option<LogPosition>)> {
        let shared = &self.shared;
        let (updates, snap_end) = {
            let st = shared.state.lock();
            (st.memlog.updates_for(blkno), st.memlog.end())
        };
        if updates.is_empty() {
            let blk = shared
                .disk
                .read(blkno)
                .map_err(|e| WalError::read_failed(blkno, e))?;
            return Ok((blk, None));
        }
        let needs_base = !updates[0].addr.is_whole_block();
        let mut blocks = merge_updates(&updates, &DataRegion(&*shared.disk))
            .map_err(|e| WalError::read_failed(blkno, e))?;
        let blk = blocks.remove(&blkno).unwrap_or_default();
        Ok((blk, needs_base.then_some(snap_end)))
    }

    /// Appends `batch` atomically and returns the log position just past it.
    ///
    /// With `wait`, returns only once the batch is durable. Without it the
    /// batch becomes durable on the next logger pass.
    pub fn commit(&self, batch: LogBatch, wait: bool) -> WalResult<LogPosition> {
        let shared = &self.shared;
        if batch.is_empty() {
            let st = shared.state.lock();
            st.check_open()?;
            return Ok(st.memlog.end());
        }
        shared.validate(&batch)?;

        let n = batch.len() as u64;
        let capacity = shared.layout.log_size();
        if n > capacity {
            return Err(WalError::log_full(batch.len(), capacity));
        }

        let deadline = Instant::now() + shared.config.commit_timeout();
        let mut st = shared.state.lock();
        loop {
            st.check_open()?;
            if st.memlog.len() + n <= capacity {
                break;
            }
            shared.request_logger(&mut st);
            shared.request_install(&mut st);
            if shared.space.wait_until(&mut st, deadline).timed_out() {
                st.check_open()?;
                if st.memlog.len() + n <= capacity {
                    break;
                }
                return Err(WalError::log_full(batch.len(), capacity));
            }
        }

        st.memlog.append(batch);
        let end = st.memlog.end();
        let generation = st.generation;
        st.pending_batches.push(end);
        shared.stats.record_commit();

        if st.memlog.len() >= shared.install_threshold() {
            shared.request_install(&mut st);
        }
        if wait || shared.config.sync_nowait_commits {
            shared.request_logger(&mut st);
        }
        if !wait {
            return Ok(end);
        }
        shared.wait_durable(st, generation, end)?;
        Ok(end)
    }

    /// Waits until everything below `pos` (capped at the current end of the
    /// log) is durable.
    pub fn flush(&self, pos: LogPosition) -> WalResult<()> {
        let shared = &self.shared;
        let mut st = shared.state.lock();
        loop {
            if st.poisoned {
                return Err(WalError::device_failed(
                    "Log header could not be restored after a failed append",
                ));
            }
            if st.disk_end >= pos.min(st.memlog.end()) {
                return Ok(());
            }
            shared.request_logger(&mut st);
            shared.durable.wait(&mut st);
        }
    }

    /// Runs one logger pass on the calling thread. Returns true if it made
    /// anything durable.
    pub fn log_now(&self) -> WalResult<bool> {
        self.shared.log_pass()
    }

    /// Runs one install pass on the calling thread and returns the number
    /// of data blocks written.
    pub fn install(&self) -> WalResult<u64> {
        self.shared.install_pass()
    }

    /// Stops both threads, then makes everything durable and installs it.
    ///
    /// Later commits fail with `BJ_WAL_CLOSED`. Calling this twice is a
    /// no-op.
    pub fn shutdown(&self) -> WalResult<()> {
        let mut workers = self.workers.lock();
        let Some(Workers { logger, installer }) = workers.take() else {
            return Ok(());
        };
        {
            let mut st = self.shared.state.lock();
            st.shutdown = true;
        }
        self.shared.logger_cv.notify_all();
        self.shared.installer_cv.notify_all();
        self.shared.space.notify_all();

        if logger.join().is_err() {
            warn!("logger thread panicked");
        }
        if installer.join().is_err() {
            warn!("installer thread panicked");
        }

        self.shared.log_pass()?;
        self.shared.install_pass()?;

        let remaining = self.pending();
        if remaining > 0 {
            return Err(WalError::append_failed(format!(
                "{} updates left in the log after shutdown",
                remaining
            )));
        }
        info!(end = self.disk_end(), "journal shut down");
        Ok(())
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "journal shutdown on drop failed");
        }
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state.lock();
        f.debug_struct("Wal")
            .field("layout", &self.shared.layout)
            .field("mem_start", &st.memlog.start())
            .field("disk_end", &st.disk_end)
            .field("mem_end", &st.memlog.end())
            .finish()
    }
}
