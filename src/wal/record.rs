//! Logged update records
//!
//! An `Update` is the durable unit of the log: an address and a block-sized
//! payload whose bits at `[addr.off, addr.off + addr.sz)` carry the new
//! value. All other payload bits are ignored. One committed operation is one
//! `LogBatch`, appended to the log as a unit.

use crate::block::{install_range, place_bits, Addr, Block};

/// Logical position in the log. Positions grow forever; the on-disk slot
/// of position `p` is `p % log_size`.
pub type LogPosition = u64;

/// Ordered updates of one committed operation.
pub type LogBatch = Vec<Update>;

/// One logged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub addr: Addr,
    pub payload: Block,
}

impl Update {
    pub fn new(addr: Addr, payload: Block) -> Self {
        Self { addr, payload }
    }

    /// Whole-block update of `blkno`.
    pub fn whole_block(blkno: u64, payload: Block) -> Self {
        Self::new(Addr::whole_block(blkno), payload)
    }

    /// Builds an update from a packed payload (bit 0 of the object first).
    pub fn from_packed(addr: Addr, packed: &[u8]) -> Self {
        let mut payload = Block::zeroed();
        place_bits(packed, &addr, &mut payload);
        Self::new(addr, payload)
    }

    /// Applies this update to `blk`, leaving bits outside the range alone.
    pub fn apply_to(&self, blk: &mut Block) {
        if self.addr.is_whole_block() {
            *blk = self.payload.clone();
            return;
        }
        install_range(&self.payload, blk, self.addr.off, self.addr.sz);
    }
}
