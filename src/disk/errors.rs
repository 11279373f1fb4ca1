//! Block device errors

use std::io;

use thiserror::Error;

/// Result type for device operations
pub type DiskResult<T> = Result<T, DiskError>;

/// Block device errors
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("block {blkno} out of range (device has {size} blocks)")]
    OutOfRange { blkno: u64, size: u64 },

    #[error("I/O error on block {blkno}: {source}")]
    Io {
        blkno: u64,
        #[source]
        source: io::Error,
    },

    #[error("device sync failed: {0}")]
    Sync(#[source] io::Error),

    #[error("device open failed: {0}")]
    Open(#[source] io::Error),

    #[error("injected device failure at block {0}")]
    Injected(u64),
}

impl DiskError {
    /// Block number involved in the failure, if any.
    pub fn blkno(&self) -> Option<u64> {
        match self {
            DiskError::OutOfRange { blkno, .. } | DiskError::Io { blkno, .. } => Some(*blkno),
            DiskError::Injected(blkno) => Some(*blkno),
            DiskError::Sync(_) | DiskError::Open(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_block() {
        let err = DiskError::OutOfRange { blkno: 99, size: 10 };
        let display = err.to_string();
        assert!(display.contains("99"));
        assert!(display.contains("10"));
        assert_eq!(err.blkno(), Some(99));
    }

    #[test]
    fn test_sync_error_has_no_block() {
        let err = DiskError::Sync(io::Error::new(io::ErrorKind::Other, "flush"));
        assert_eq!(err.blkno(), None);
    }
}
