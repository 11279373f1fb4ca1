//! Staged buffers and the buffer-merge engine
//!
//! A `Buf` is one object staged by an operation: its address, its packed
//! bits and a dirty flag. The merge engine folds an ordered run of logged
//! updates into one resolved block per touched block number.

mod merge;

pub use merge::{merge_updates, BlockSource};

use crate::block::{install_one_bit, place_bits, Addr, Block};
use crate::wal::Update;

/// A staged object inside one operation.
///
/// A buffer filled by a read remembers the bits it was read with, so the
/// bits a caller actually changed can be told apart from the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buf {
    addr: Addr,
    data: Vec<u8>,
    read_as: Option<Vec<u8>>,
    dirty: bool,
}

impl Buf {
    /// Creates a clean buffer holding `data` (packed, `addr.payload_len()` bytes).
    pub fn new(addr: Addr, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), addr.payload_len());
        Self {
            addr,
            read_as: Some(data.clone()),
            data,
            dirty: false,
        }
    }

    pub fn addr(&self) -> Addr {
        self.addr
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the packed bits. Call `set_dirty` afterwards for
    /// the change to be committed.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Replaces the packed bits and marks the buffer dirty.
    ///
    /// Every bit of the buffer counts as changed afterwards.
    pub fn overwrite(&mut self, data: Vec<u8>) {
        debug_assert_eq!(data.len(), self.addr.payload_len());
        self.data = data;
        self.read_as = None;
        self.dirty = true;
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The logged form of this buffer.
    pub fn to_update(&self) -> Update {
        Update::from_packed(self.addr, &self.data)
    }

    /// Writes every bit of the buffer into `blk`.
    pub fn place_into(&self, blk: &mut Block) {
        place_bits(&self.data, &self.addr, blk);
    }

    /// Writes into `blk` only the bits that differ from what was read.
    pub fn place_changes_into(&self, blk: &mut Block) {
        let Some(read_as) = &self.read_as else {
            self.place_into(blk);
            return;
        };
        for i in 0..self.addr.sz {
            let (byte, bit) = ((i / 8) as usize, (i % 8) as u8);
            let v = (self.data[byte] >> bit) & 1;
            if v == (read_as[byte] >> bit) & 1 {
                continue;
            }
            let pos = self.addr.off + i;
            let (dst, dst_bit) = ((pos / 8) as usize, (pos % 8) as u8);
            blk[dst] = install_one_bit(v << dst_bit, blk[dst], dst_bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buf_is_clean() {
        let buf = Buf::new(Addr::bytes(5, 0, 2), vec![1, 2]);
        assert!(!buf.is_dirty());
        assert_eq!(buf.data(), &[1, 2]);
    }

    #[test]
    fn test_mutation_then_set_dirty() {
        let mut buf = Buf::new(Addr::bytes(5, 0, 2), vec![0, 0]);
        buf.data_mut()[1] = 7;
        buf.set_dirty();
        assert!(buf.is_dirty());
        let u = buf.to_update();
        assert_eq!(&u.payload[..2], &[0, 7]);
    }

    #[test]
    fn test_to_update_places_unaligned_bits() {
        let mut buf = Buf::new(Addr::new(5, 4, 3), vec![0]);
        buf.overwrite(vec![0b101]);
        let u = buf.to_update();
        assert_eq!(u.payload[0], 0b0101_0000);
    }

    #[test]
    fn test_place_changes_skips_unchanged_bits() {
        let mut buf = Buf::new(Addr::bytes(5, 0, 2), vec![0, 0]);
        buf.data_mut()[1] = 0x0f;
        buf.set_dirty();

        let mut blk = Block::with_prefix(&[9, 0xf0]);
        buf.place_changes_into(&mut blk);
        assert_eq!(&blk[..2], &[9, 0xff]);

        buf.place_into(&mut blk);
        assert_eq!(&blk[..2], &[0, 0x0f]);
    }

    #[test]
    fn test_overwritten_buf_changes_every_bit() {
        let mut buf = Buf::new(Addr::new(5, 4, 3), vec![0b101]);
        buf.overwrite(vec![0b101]);

        let mut blk = Block::zeroed();
        buf.place_changes_into(&mut blk);
        assert_eq!(blk[0], 0b0101_0000);
    }
}
