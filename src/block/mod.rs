//! Block and address primitives
//!
//! A `Block` is the fixed-size unit shared by the log region and the data
//! region. An `Addr` names a contiguous bit range inside one block; the
//! range covering all `NBITBLOCK` bits is a whole-block address.
//!
//! # Invariants
//!
//! - Every `Block` is exactly `BLOCK_SIZE` bytes
//! - A valid `Addr` has `sz > 0` and `off + sz <= NBITBLOCK`

mod bits;

pub use bits::{extract_bits, install_one_bit, install_range, place_bits};

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Block size in bytes (one disk sector/page unit).
pub const BLOCK_SIZE: usize = 4096;

/// Number of bits in a block.
pub const NBITBLOCK: u64 = (BLOCK_SIZE as u64) * 8;

/// Fixed-size block buffer.
///
/// Value type: cloning copies the full contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Block(Box<[u8; BLOCK_SIZE]>);

impl Block {
    /// Creates a block filled with zeroes.
    pub fn zeroed() -> Self {
        Self(Box::new([0u8; BLOCK_SIZE]))
    }

    /// Creates a block whose first bytes are `prefix`, zero-padded.
    ///
    /// Bytes beyond `BLOCK_SIZE` are ignored.
    pub fn with_prefix(prefix: &[u8]) -> Self {
        let mut blk = Self::zeroed();
        let n = prefix.len().min(BLOCK_SIZE);
        blk.0[..n].copy_from_slice(&prefix[..n]);
        blk
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for Block {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl DerefMut for Block {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_bytes_mut()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonzero = self.0.iter().filter(|b| **b != 0).count();
        f.debug_struct("Block")
            .field("head", &&self.0[..8])
            .field("nonzero_bytes", &nonzero)
            .finish()
    }
}

/// Location of a bit range within one block.
///
/// `off` and `sz` are in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr {
    /// Absolute block number on the device
    pub blkno: u64,
    /// Bit offset within the block
    pub off: u64,
    /// Length in bits
    pub sz: u64,
}

impl Addr {
    pub fn new(blkno: u64, off: u64, sz: u64) -> Self {
        Self { blkno, off, sz }
    }

    /// Address covering all bits of `blkno`.
    pub fn whole_block(blkno: u64) -> Self {
        Self::new(blkno, 0, NBITBLOCK)
    }

    /// Address of a byte range within `blkno`.
    pub fn bytes(blkno: u64, byte_off: usize, byte_len: usize) -> Self {
        Self::new(blkno, byte_off as u64 * 8, byte_len as u64 * 8)
    }

    pub fn is_whole_block(&self) -> bool {
        self.off == 0 && self.sz == NBITBLOCK
    }

    /// Returns true if the range is non-empty and lies inside the block.
    pub fn is_valid(&self) -> bool {
        self.sz > 0
            && self
                .off
                .checked_add(self.sz)
                .map_or(false, |end| end <= NBITBLOCK)
    }

    /// Number of bytes needed to hold `sz` packed bits.
    pub fn payload_len(&self) -> usize {
        self.sz.div_ceil(8) as usize
    }

    /// Returns true if the two ranges share a block and overlap.
    pub fn overlaps(&self, other: &Addr) -> bool {
        self.blkno == other.blkno
            && self.off < other.off + other.sz
            && other.off < self.off + self.sz
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}+{}", self.blkno, self.off, self.sz)
    }
}
