//! Filesystem errors

use thiserror::Error;

use crate::txn::TxnError;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("device of {disk_blocks} blocks too small for {ninodes} inodes (needs {needed})")]
    Geometry {
        ninodes: u64,
        needed: u64,
        disk_blocks: u64,
    },

    #[error("invalid inode number {0}")]
    InvalidInum(u64),

    #[error("count {count} does not match payload length {len}")]
    CountMismatch { count: u64, len: usize },

    #[error("offset {offset} + count {count} overflows")]
    Overflow { offset: u64, count: u64 },

    #[error("write of {count} bytes at {offset} crosses the end of the file block")]
    BeyondBlock { offset: u64, count: u64 },

    #[error("offset {offset} is past the end of the file (size {size})")]
    BeyondSize { offset: u64, size: u64 },

    #[error(transparent)]
    Txn(#[from] TxnError),
}

impl FsError {
    /// True for request errors, as opposed to journal failures.
    pub fn is_invalid_request(&self) -> bool {
        !matches!(self, FsError::Txn(_) | FsError::Geometry { .. })
    }
}
