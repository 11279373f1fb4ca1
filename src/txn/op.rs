//! A single logical operation over the journal
//!
//! An `Op` stages reads and writes privately. Nothing it writes is visible
//! to anyone else until `commit`, which hands every dirty buffer to the
//! journal as one batch. Dropping an `Op` without committing aborts it.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::errors::{TxnError, TxnResult};
use crate::block::{extract_bits, Addr, Block};
use crate::buf::{merge_updates, BlockSource, Buf};
use crate::disk::DiskResult;
use crate::wal::{LogBatch, Update, Wal, WalError};

/// Merge base holding one already-read block.
struct ReadBlock<'b> {
    blkno: u64,
    blk: &'b Block,
}

impl BlockSource for ReadBlock<'_> {
    fn read_block(&self, blkno: u64) -> DiskResult<Block> {
        debug_assert_eq!(blkno, self.blkno);
        Ok(self.blk.clone())
    }
}

/// Staging area for one operation.
pub struct Op<'a> {
    wal: &'a Wal,
    bufs: Vec<Buf>,
    index: HashMap<Addr, usize>,
}

impl<'a> Op<'a> {
    pub fn begin(wal: &'a Wal) -> Self {
        Self {
            wal,
            bufs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of staged buffers, clean or dirty.
    pub fn staged(&self) -> usize {
        self.bufs.len()
    }

    /// Number of staged buffers that `commit` would log.
    pub fn dirty(&self) -> usize {
        self.bufs.iter().filter(|b| b.is_dirty()).count()
    }

    /// Returns the staged buffer for `addr`, reading it if needed.
    ///
    /// A fresh read sees committed data plus this op's own dirty writes to
    /// the same block. Callers that mutate the buffer must call
    /// `Buf::set_dirty`.
    pub fn read_buf(&mut self, addr: Addr) -> TxnResult<&mut Buf> {
        if !addr.is_valid() {
            return Err(TxnError::InvalidAddress(addr));
        }
        if let Some(&i) = self.index.get(&addr) {
            return Ok(&mut self.bufs[i]);
        }

        let committed = self.wal.read(addr.blkno)?;
        let own: Vec<Update> = self
            .bufs
            .iter()
            .filter(|b| b.is_dirty() && b.addr().blkno == addr.blkno)
            .map(Buf::to_update)
            .collect();
        let data = if own.is_empty() {
            extract_bits(&committed, &addr)
        } else {
            let source = ReadBlock {
                blkno: addr.blkno,
                blk: &committed,
            };
            let merged = merge_updates(&own, &source)
                .map_err(|e| WalError::read_failed(addr.blkno, e))?;
            let blk = merged.get(&addr.blkno).unwrap_or(&committed);
            extract_bits(blk, &addr)
        };

        trace!(%addr, "staged read");
        Ok(self.push(Buf::new(addr, data)))
    }

    /// Stages a write of `data` (packed bits) at `addr` without reading it.
    ///
    /// A later overwrite of the same address moves it behind every other
    /// staged write, so it wins where they overlap.
    pub fn overwrite(&mut self, addr: Addr, data: Vec<u8>) -> TxnResult<()> {
        if !addr.is_valid() {
            return Err(TxnError::InvalidAddress(addr));
        }
        if data.len() != addr.payload_len() {
            return Err(TxnError::PayloadSize {
                addr,
                expected: addr.payload_len(),
                got: data.len(),
            });
        }
        if let Some(i) = self.index.remove(&addr) {
            self.bufs.remove(i);
            for slot in self.index.values_mut() {
                if *slot > i {
                    *slot -= 1;
                }
            }
        }
        let mut buf = Buf::new(addr, data);
        buf.set_dirty();
        self.push(buf);
        Ok(())
    }

    fn push(&mut self, buf: Buf) -> &mut Buf {
        let i = self.bufs.len();
        self.index.insert(buf.addr(), i);
        self.bufs.push(buf);
        &mut self.bufs[i]
    }

    /// Logs every dirty buffer as one batch.
    ///
    /// With `wait`, returns once the batch is durable. An op with nothing
    /// dirty commits without touching the journal. On error none of the
    /// op's writes take effect.
    pub fn commit(self, wait: bool) -> TxnResult<()> {
        let batch = self.dirty_batch();
        if batch.is_empty() {
            return Ok(());
        }
        let n = batch.len();
        let end = self.wal.commit(batch, wait)?;
        trace!(updates = n, end, wait, "op committed");
        Ok(())
    }

    /// Builds the logged form of every dirty buffer, in staging order.
    ///
    /// Dirty buffers that overlap on one block are first folded together:
    /// each contributes all of its bits, then each re-applies only the bits
    /// it changed since it was read. Every overlapping buffer is then logged
    /// with the folded bits, so a stale copy in one cannot undo a change
    /// made through another.
    fn dirty_batch(&self) -> LogBatch {
        let dirty: Vec<&Buf> = self.bufs.iter().filter(|b| b.is_dirty()).collect();

        let mut by_block: BTreeMap<u64, Vec<&Buf>> = BTreeMap::new();
        for &buf in &dirty {
            by_block.entry(buf.addr().blkno).or_default().push(buf);
        }
        let mut folded: HashMap<u64, Block> = HashMap::new();
        for (blkno, bufs) in by_block {
            let overlapping = bufs.iter().enumerate().any(|(i, a)| {
                bufs[i + 1..]
                    .iter()
                    .any(|b| a.addr().overlaps(&b.addr()))
            });
            if !overlapping {
                continue;
            }
            let mut blk = Block::zeroed();
            for buf in &bufs {
                buf.place_into(&mut blk);
            }
            for buf in &bufs {
                buf.place_changes_into(&mut blk);
            }
            trace!(blkno, bufs = bufs.len(), "folded overlapping writes");
            folded.insert(blkno, blk);
        }

        dirty
            .into_iter()
            .map(|buf| match folded.get(&buf.addr().blkno) {
                Some(blk) => Update::from_packed(buf.addr(), &extract_bits(blk, &buf.addr())),
                None => buf.to_update(),
            })
            .collect()
    }

    /// Discards every staged buffer.
    pub fn abort(self) {
        trace!(staged = self.bufs.len(), "op aborted");
    }
}
