//! Logger: moves committed batches from memory into the circular region
//!
//! A pass copies `[disk_end, mem_end)` under the metadata lock, appends it
//! to the circular region without the lock, then publishes the new
//! `disk_end` and wakes durability waiters.
//!
//! A failed append discards every non-durable entry. Waiters whose batch
//! lay in the discarded tail get `BJ_WAL_APPEND_FAILED`; nothing of those
//! batches stays visible to readers.

use tracing::{debug, error, warn};

use super::engine::Shared;
use super::errors::{WalError, WalResult};

impl Shared {
    /// One logger pass. Returns true if it made anything durable.
    pub(super) fn log_pass(&self) -> WalResult<bool> {
        let mut appender = self.appender.lock();

        let (from, updates) = {
            let st = self.state.lock();
            if st.poisoned {
                return Ok(false);
            }
            (st.disk_end, st.memlog.slice(st.disk_end, st.memlog.end()))
        };
        if updates.is_empty() {
            return Ok(false);
        }
        debug_assert_eq!(appender.end(), from);

        match appender.append(&*self.disk, &updates) {
            Ok(end) => {
                let batches = {
                    let mut st = self.state.lock();
                    st.disk_end = end;
                    let done = st.pending_batches.iter().take_while(|e| **e <= end).count();
                    st.pending_batches.drain(..done);
                    done as u64
                };
                self.stats.record_logger_pass(batches);
                self.durable.notify_all();
                debug!(from, end, batches, "logged batches");
                Ok(true)
            }
            Err(err) => {
                let restored = appender.restore(&*self.disk);
                let mut st = self.state.lock();
                if let Err(e) = &restored {
                    error!(error = %e, "failed to restore log header; journal is read-only");
                    st.poisoned = true;
                }
                let disk_end = st.disk_end;
                let lost = st.memlog.end() - disk_end;
                st.memlog.truncate_to(disk_end);
                st.pending_batches.clear();
                st.rollback_ends.push(disk_end);
                st.generation += 1;
                drop(st);

                self.stats.record_failed_append();
                self.durable.notify_all();
                self.space.notify_all();
                warn!(error = %err, disk_end, lost, "log append failed; discarded non-durable updates");
                Err(WalError::append_io(
                    format!("Failed to append {} updates at position {}", updates.len(), from),
                    err,
                ))
            }
        }
    }

    pub(super) fn logger_loop(&self) {
        let interval = self.config.logger_interval();
        loop {
            {
                let mut st = self.state.lock();
                if !st.logger_requested && !st.shutdown {
                    self.logger_cv.wait_for(&mut st, interval);
                }
                if st.shutdown {
                    break;
                }
                st.logger_requested = false;
            }
            if let Err(e) = self.log_pass() {
                warn!(error = %e, "logger pass failed");
            }
        }
        debug!("logger stopped");
    }
}
