//! In-memory block device
//!
//! Used by tests and benchmarks. Counts every operation and can inject
//! failures: a write budget simulates a crash (every write after the budget
//! is lost), and a failing block range simulates a bad region.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::errors::{DiskError, DiskResult};
use super::Disk;
use crate::block::Block;

#[derive(Debug, Default)]
struct Faults {
    /// Remaining writes before every write fails
    write_budget: Option<u64>,
    /// Writes into this range fail
    failing: Option<Range<u64>>,
}

/// Block device held entirely in memory.
#[derive(Debug)]
pub struct MemDisk {
    blocks: Mutex<Vec<Block>>,
    faults: Mutex<Faults>,
    fail_barrier: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    barriers: AtomicU64,
}

impl MemDisk {
    /// Creates a device of `nblocks` zeroed blocks.
    pub fn new(nblocks: u64) -> Self {
        Self::from_blocks(vec![Block::zeroed(); nblocks as usize])
    }

    fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Mutex::new(blocks),
            faults: Mutex::new(Faults::default()),
            fail_barrier: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            barriers: AtomicU64::new(0),
        }
    }

    /// Copies the current contents into a fresh device with no faults.
    ///
    /// Taking a snapshot at an arbitrary moment models a crash: the copy
    /// holds exactly the writes that reached the device.
    pub fn snapshot(&self) -> MemDisk {
        MemDisk::from_blocks(self.blocks.lock().clone())
    }

    /// Allows `n` more writes, then fails every write.
    pub fn crash_after_writes(&self, n: u64) {
        self.faults.lock().write_budget = Some(n);
    }

    /// Fails every write to a block in `range`.
    pub fn fail_writes_in(&self, range: Range<u64>) {
        self.faults.lock().failing = Some(range);
    }

    /// Makes `barrier` fail until faults are cleared.
    pub fn fail_barriers(&self) {
        self.fail_barrier.store(true, Ordering::SeqCst);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
        self.fail_barrier.store(false, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn barrier_count(&self) -> u64 {
        self.barriers.load(Ordering::SeqCst)
    }

    fn check_faults(&self, blkno: u64) -> DiskResult<()> {
        let mut faults = self.faults.lock();
        if let Some(range) = &faults.failing {
            if range.contains(&blkno) {
                return Err(DiskError::Injected(blkno));
            }
        }
        if let Some(budget) = faults.write_budget.as_mut() {
            if *budget == 0 {
                return Err(DiskError::Injected(blkno));
            }
            *budget -= 1;
        }
        Ok(())
    }
}

impl Disk for MemDisk {
    fn read(&self, blkno: u64) -> DiskResult<Block> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let blocks = self.blocks.lock();
        blocks
            .get(blkno as usize)
            .cloned()
            .ok_or(DiskError::OutOfRange {
                blkno,
                size: blocks.len() as u64,
            })
    }

    fn write(&self, blkno: u64, blk: &Block) -> DiskResult<()> {
        self.check_faults(blkno)?;
        let mut blocks = self.blocks.lock();
        let size = blocks.len() as u64;
        let slot = blocks
            .get_mut(blkno as usize)
            .ok_or(DiskError::OutOfRange { blkno, size })?;
        *slot = blk.clone();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn barrier(&self) -> DiskResult<()> {
        if self.fail_barrier.load(Ordering::SeqCst) {
            return Err(DiskError::Sync(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected barrier failure",
            )));
        }
        self.barriers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.blocks.lock().len() as u64
    }
}
