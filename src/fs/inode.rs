//! Inode table layout and encoding
//!
//! The inode table starts at the first block of the journal's data region;
//! each inode owns exactly one data block after the table.
//!
//! ```text
//! data_start ..                inode table, INODES_PER_BLOCK per block
//! data_start + inode_blocks .. one data block per inode, in inum order
//! ```

use crate::block::{Addr, BLOCK_SIZE};
use crate::txn::{Op, TxnResult};

/// Encoded size of one inode in bytes.
pub const INODE_SIZE: usize = 128;

/// Inodes per table block.
pub const INODES_PER_BLOCK: u64 = (BLOCK_SIZE / INODE_SIZE) as u64;

/// Placement of the inode table and file blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsLayout {
    inode_start: u64,
    ninodes: u64,
}

impl FsLayout {
    pub fn new(inode_start: u64, ninodes: u64) -> Self {
        Self {
            inode_start,
            ninodes,
        }
    }

    pub fn ninodes(&self) -> u64 {
        self.ninodes
    }

    pub fn inode_blocks(&self) -> u64 {
        self.ninodes.div_ceil(INODES_PER_BLOCK)
    }

    /// First file data block.
    pub fn data_start(&self) -> u64 {
        self.inode_start + self.inode_blocks()
    }

    /// Device blocks needed by the table and every file block, or `None`
    /// if that does not fit in a block number.
    pub fn end(&self) -> Option<u64> {
        self.inode_start
            .checked_add(self.inode_blocks())?
            .checked_add(self.ninodes)
    }

    pub fn is_valid_inum(&self, inum: u64) -> bool {
        inum < self.ninodes
    }

    /// Location of inode `inum` in the table.
    pub fn inode_addr(&self, inum: u64) -> Addr {
        Addr::bytes(
            self.inode_start + inum / INODES_PER_BLOCK,
            (inum % INODES_PER_BLOCK) as usize * INODE_SIZE,
            INODE_SIZE,
        )
    }

    /// The single data block of `inum`.
    pub fn data_block(&self, inum: u64) -> u64 {
        self.data_start() + inum
    }
}

/// In-memory copy of one inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub inum: u64,
    pub size: u64,
}

impl Inode {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; INODE_SIZE];
        out[..8].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    pub fn decode(inum: u64, bytes: &[u8]) -> Self {
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[..8]);
        Self {
            inum,
            size: u64::from_le_bytes(size),
        }
    }

    /// Reads inode `inum` through `op`.
    pub fn load(op: &mut Op<'_>, layout: &FsLayout, inum: u64) -> TxnResult<Self> {
        let buf = op.read_buf(layout.inode_addr(inum))?;
        Ok(Self::decode(inum, buf.data()))
    }

    /// Stages this inode's encoding in `op`.
    pub fn save(&self, op: &mut Op<'_>, layout: &FsLayout) -> TxnResult<()> {
        op.overwrite(layout.inode_addr(self.inum), self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let layout = FsLayout::new(100, 40);
        assert_eq!(INODES_PER_BLOCK, 32);
        assert_eq!(layout.inode_blocks(), 2);
        assert_eq!(layout.data_start(), 102);
        assert_eq!(layout.end(), Some(142));
        assert_eq!(layout.data_block(5), 107);
        assert_eq!(layout.inode_addr(33), Addr::bytes(101, INODE_SIZE, INODE_SIZE));
        assert!(layout.is_valid_inum(39));
        assert!(!layout.is_valid_inum(40));
    }

    #[test]
    fn test_layout_end_overflow() {
        assert_eq!(FsLayout::new(10, u64::MAX).end(), None);
        assert_eq!(FsLayout::new(u64::MAX, 1).end(), None);
    }

    #[test]
    fn test_encode_decode() {
        let ip = Inode { inum: 3, size: 4000 };
        let bytes = ip.encode();
        assert_eq!(bytes.len(), INODE_SIZE);
        assert_eq!(Inode::decode(3, &bytes), ip);
    }

    #[test]
    fn test_zeroed_inode_is_empty() {
        assert_eq!(Inode::decode(0, &[0u8; INODE_SIZE]).size, 0);
    }
}
