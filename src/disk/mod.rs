//! Block device interface
//!
//! The journal talks to storage only through the `Disk` trait. A write is
//! durable once `barrier` returns; callers that need ordering between two
//! writes place a barrier between them.
//!
//! Two implementations ship with the crate:
//! - `FileDisk`: a regular file or block device using positional I/O
//! - `MemDisk`: an in-memory device with I/O counters and fault injection

mod errors;
mod file;
mod mem;

pub use errors::{DiskError, DiskResult};
pub use file::FileDisk;
pub use mem::MemDisk;

use crate::block::Block;

/// Fixed-size block storage.
///
/// Implementations must make single-block reads and writes atomic with
/// respect to each other; concurrent callers never observe a torn block.
pub trait Disk: Send + Sync {
    /// Reads block `blkno`.
    fn read(&self, blkno: u64) -> DiskResult<Block>;

    /// Writes block `blkno`.
    fn write(&self, blkno: u64, blk: &Block) -> DiskResult<()>;

    /// Makes all completed writes durable.
    fn barrier(&self) -> DiskResult<()>;

    /// Number of blocks on the device.
    fn size(&self) -> u64;
}

impl<D: Disk + ?Sized> Disk for std::sync::Arc<D> {
    fn read(&self, blkno: u64) -> DiskResult<Block> {
        (**self).read(blkno)
    }

    fn write(&self, blkno: u64, blk: &Block) -> DiskResult<()> {
        (**self).write(blkno, blk)
    }

    fn barrier(&self) -> DiskResult<()> {
        (**self).barrier()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}
