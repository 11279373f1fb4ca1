//! Minimal single-block filesystem on top of the journal
//!
//! Each inode owns one data block, so a file holds at most `BLOCK_SIZE`
//! bytes. Requests are validated before any transaction is opened; a valid
//! write takes the inode lock, updates the data block and, if the file
//! grew, the inode, all in one `Op` committed durably before replying.

mod errors;
mod inode;

pub use errors::{FsError, FsResult};
pub use inode::{FsLayout, Inode, INODES_PER_BLOCK, INODE_SIZE};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::block::{Addr, BLOCK_SIZE};
use crate::lockmap::LockMap;
use crate::txn::Op;
use crate::wal::Wal;

/// Outcome of a request, in the vocabulary a protocol layer maps from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FsStatus {
    Ok,
    /// Rejected before anything changed
    Inval,
    /// The journal failed; nothing changed
    ServerFault,
}

/// A decoded write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteArgs {
    pub inum: u64,
    pub offset: u64,
    pub count: u64,
    pub data: Vec<u8>,
}

impl WriteArgs {
    /// Request whose count matches its payload.
    pub fn new(inum: u64, offset: u64, data: Vec<u8>) -> Self {
        Self {
            inum,
            offset,
            count: data.len() as u64,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReply {
    pub status: FsStatus,
    pub count: u64,
}

impl WriteReply {
    fn status(status: FsStatus) -> Self {
        Self { status, count: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadReply {
    pub status: FsStatus,
    pub data: Vec<u8>,
    pub eof: bool,
}

/// Attributes returned by `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attr {
    pub inum: u64,
    pub size: u64,
}

/// Journaled filesystem over a `Wal`.
#[derive(Debug)]
pub struct Filesystem {
    wal: Arc<Wal>,
    locks: LockMap,
    layout: FsLayout,
}

impl Filesystem {
    /// Places `ninodes` inodes and their data blocks in the journal's data
    /// region. A zeroed region is a valid empty filesystem.
    pub fn new(wal: Arc<Wal>, ninodes: u64) -> FsResult<Self> {
        let layout = FsLayout::new(wal.data_start(), ninodes);
        let needed = layout.end().unwrap_or(u64::MAX);
        if ninodes == 0 || layout.end().map_or(true, |end| end > wal.disk_size()) {
            return Err(FsError::Geometry {
                ninodes,
                needed,
                disk_blocks: wal.disk_size(),
            });
        }
        Ok(Self {
            wal,
            locks: LockMap::new(),
            layout,
        })
    }

    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    pub fn layout(&self) -> &FsLayout {
        &self.layout
    }

    fn check_inum(&self, inum: u64) -> FsResult<()> {
        if !self.layout.is_valid_inum(inum) {
            return Err(FsError::InvalidInum(inum));
        }
        Ok(())
    }

    /// Checks everything that does not need the inode.
    fn check_write(&self, args: &WriteArgs) -> FsResult<()> {
        self.check_inum(args.inum)?;
        if args.count != args.data.len() as u64 {
            return Err(FsError::CountMismatch {
                count: args.count,
                len: args.data.len(),
            });
        }
        let end = args.offset.checked_add(args.count).ok_or(FsError::Overflow {
            offset: args.offset,
            count: args.count,
        })?;
        if end > BLOCK_SIZE as u64 {
            return Err(FsError::BeyondBlock {
                offset: args.offset,
                count: args.count,
            });
        }
        Ok(())
    }

    /// Writes `args.data` at `args.offset` of inode `args.inum`.
    ///
    /// Data and size change atomically and are durable on `Ok`.
    pub fn write(&self, args: &WriteArgs) -> WriteReply {
        if let Err(e) = self.check_write(args) {
            debug!(inum = args.inum, error = %e, "write rejected");
            return WriteReply::status(FsStatus::Inval);
        }

        let _lock = self.locks.acquire(args.inum);
        match self.write_locked(args) {
            Ok(count) => WriteReply {
                status: FsStatus::Ok,
                count,
            },
            Err(e) if e.is_invalid_request() => {
                debug!(inum = args.inum, error = %e, "write rejected");
                WriteReply::status(FsStatus::Inval)
            }
            Err(e) => {
                warn!(inum = args.inum, error = %e, "write failed");
                WriteReply::status(FsStatus::ServerFault)
            }
        }
    }

    fn write_locked(&self, args: &WriteArgs) -> FsResult<u64> {
        let mut op = Op::begin(&self.wal);
        let mut ip = Inode::load(&mut op, &self.layout, args.inum)?;
        if args.offset > ip.size {
            return Err(FsError::BeyondSize {
                offset: args.offset,
                size: ip.size,
            });
        }

        let off = args.offset as usize;
        let buf = op.read_buf(Addr::whole_block(self.layout.data_block(args.inum)))?;
        buf.data_mut()[off..off + args.data.len()].copy_from_slice(&args.data);
        buf.set_dirty();

        let end = args.offset + args.count;
        if end > ip.size {
            ip.size = end;
            ip.save(&mut op, &self.layout)?;
        }
        op.commit(true)?;
        Ok(args.count)
    }

    /// Reads up to `count` bytes at `offset`.
    pub fn read(&self, inum: u64, offset: u64, count: u64) -> ReadReply {
        let fail = |status| ReadReply {
            status,
            data: Vec::new(),
            eof: false,
        };
        if let Err(e) = self.check_inum(inum) {
            debug!(inum, error = %e, "read rejected");
            return fail(FsStatus::Inval);
        }

        let _lock = self.locks.acquire(inum);
        match self.read_locked(inum, offset, count) {
            Ok((data, eof)) => ReadReply {
                status: FsStatus::Ok,
                data,
                eof,
            },
            Err(e) => {
                warn!(inum, error = %e, "read failed");
                fail(FsStatus::ServerFault)
            }
        }
    }

    fn read_locked(&self, inum: u64, offset: u64, count: u64) -> FsResult<(Vec<u8>, bool)> {
        let mut op = Op::begin(&self.wal);
        let ip = Inode::load(&mut op, &self.layout, inum)?;
        if offset >= ip.size {
            return Ok((Vec::new(), true));
        }
        let n = count.min(ip.size - offset);
        if n == 0 {
            return Ok((Vec::new(), false));
        }
        let addr = Addr::bytes(self.layout.data_block(inum), offset as usize, n as usize);
        let data = op.read_buf(addr)?.data().to_vec();
        op.abort();
        Ok((data, offset + n >= ip.size))
    }

    /// Current attributes of `inum`.
    pub fn getattr(&self, inum: u64) -> FsResult<Attr> {
        self.check_inum(inum)?;
        let _lock = self.locks.acquire(inum);
        let mut op = Op::begin(&self.wal);
        let ip = Inode::load(&mut op, &self.layout, inum)?;
        Ok(Attr {
            inum,
            size: ip.size,
        })
    }
}
