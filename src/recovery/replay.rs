//! Log replay for recovery
//!
//! Installs every durable update found in the circular region, in log
//! order, then advances the on-disk `start` to the recovered `end`.
//!
//! Replay is idempotent: a crash at any point leaves `start` untouched or
//! already advanced, and replaying the same prefix again yields the same
//! data region.

use tracing::debug;

use super::errors::{RecoveryError, RecoveryResult};
use crate::buf::merge_updates;
use crate::crash_point::{maybe_crash, points};
use crate::disk::Disk;
use crate::wal::circular::{self, RecoveredLog};
use crate::wal::{DataRegion, LogPosition};

/// Statistics from log replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Recovered `start` position
    pub start: LogPosition,
    /// Recovered `end` position; the log is empty from here on
    pub end: LogPosition,
    /// Number of logged updates replayed
    pub entries_replayed: u64,
    /// Number of data blocks written
    pub blocks_written: u64,
}

/// Replays a recovered log into the data region
pub struct LogReplayer;

impl LogReplayer {
    /// Replay `log` onto `disk`.
    ///
    /// Steps:
    /// 1. Merge `[start, end)` over the data region
    /// 2. Write every resolved block, then barrier
    /// 3. Write `start = end`, then barrier
    pub fn replay(disk: &dyn Disk, log: &RecoveredLog) -> RecoveryResult<ReplayStats> {
        let mut stats = ReplayStats {
            start: log.start,
            end: log.end,
            ..Default::default()
        };
        if log.updates.is_empty() {
            return Ok(stats);
        }

        let blocks = merge_updates(&log.updates, &DataRegion(disk))
            .map_err(|e| RecoveryError::replay_failed("Failed to read replay base", e))?;
        for (blkno, blk) in &blocks {
            disk.write(*blkno, blk).map_err(|e| {
                RecoveryError::replay_failed(format!("Failed to replay block {}", blkno), e)
            })?;
        }
        disk.barrier()
            .map_err(|e| RecoveryError::replay_failed("Barrier after replay failed", e))?;
        maybe_crash(points::RECOVERY_AFTER_REPLAY);

        circular::write_start(disk, log.end)
            .map_err(|e| RecoveryError::replay_failed("Failed to advance log start", e))?;

        stats.entries_replayed = log.updates.len() as u64;
        stats.blocks_written = blocks.len() as u64;
        debug!(
            start = stats.start,
            end = stats.end,
            blocks = stats.blocks_written,
            "replayed log"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Addr, Block};
    use crate::disk::MemDisk;
    use crate::wal::circular::{format, recover, LogLayout};
    use crate::wal::Update;

    fn formatted(log_size: u64) -> MemDisk {
        let layout = LogLayout::new(log_size);
        let disk = MemDisk::new(layout.data_start() + 8);
        format(&disk, layout).unwrap();
        disk
    }

    #[test]
    fn test_replay_empty_log() {
        let disk = formatted(4);
        let log = recover(&disk).unwrap();
        let stats = LogReplayer::replay(&disk, &log).unwrap();
        assert_eq!(stats, ReplayStats::default());
    }

    #[test]
    fn test_replay_installs_and_advances_start() {
        let disk = formatted(4);
        let data = LogLayout::new(4).data_start();
        let mut app = recover(&disk).unwrap().appender;
        app.append(
            &disk,
            &[
                Update::whole_block(data, Block::with_prefix(&[1, 1, 1])),
                Update::from_packed(Addr::bytes(data, 1, 1), &[9]),
                Update::from_packed(Addr::bytes(data + 1, 0, 2), &[7, 7]),
            ],
        )
        .unwrap();

        let log = recover(&disk).unwrap();
        let stats = LogReplayer::replay(&disk, &log).unwrap();
        assert_eq!(stats.entries_replayed, 3);
        assert_eq!(stats.blocks_written, 2);
        assert_eq!(&disk.read(data).unwrap()[..3], &[1, 9, 1]);
        assert_eq!(&disk.read(data + 1).unwrap()[..2], &[7, 7]);

        let after = recover(&disk).unwrap();
        assert_eq!(after.start, 3);
        assert!(after.updates.is_empty());
    }

    #[test]
    fn test_replay_is_idempotent() {
        let disk = formatted(4);
        let data = LogLayout::new(4).data_start();
        let mut app = recover(&disk).unwrap().appender;
        app.append(&disk, &[Update::from_packed(Addr::new(data, 3, 2), &[0b11])])
            .unwrap();

        let log = recover(&disk).unwrap();
        LogReplayer::replay(&disk, &log).unwrap();
        let first = disk.read(data).unwrap();
        // replay the same log again, as after a crash before `start` moved
        LogReplayer::replay(&disk, &log).unwrap();
        assert_eq!(disk.read(data).unwrap(), first);
        assert_eq!(first[0], 0b0001_1000);
    }

    #[test]
    fn test_replay_write_failure_keeps_start() {
        let disk = formatted(4);
        let data = LogLayout::new(4).data_start();
        let mut app = recover(&disk).unwrap().appender;
        app.append(&disk, &[Update::whole_block(data, Block::with_prefix(&[5]))])
            .unwrap();

        let log = recover(&disk).unwrap();
        disk.fail_writes_in(data..data + 1);
        assert!(LogReplayer::replay(&disk, &log).is_err());
        disk.clear_faults();
        assert_eq!(recover(&disk).unwrap().start, 0);
    }
}
