//! Buffer-merge engine
//!
//! Folds an ordered batch of updates into one block per block number. A
//! whole-block update replaces the working value outright and never reads
//! the source. A partial update starts from the working value already in
//! the map, or from the source the first time the block is seen.

use std::collections::BTreeMap;

use crate::block::Block;
use crate::disk::DiskResult;
use crate::wal::Update;

/// Where the merge engine reads the base value of a block.
pub trait BlockSource {
    fn read_block(&self, blkno: u64) -> DiskResult<Block>;
}

/// Merges `updates` (oldest first) into one resolved block per touched
/// block number.
///
/// The result equals applying every update in order to freshly read
/// blocks.
pub fn merge_updates<S: BlockSource + ?Sized>(
    updates: &[Update],
    source: &S,
) -> DiskResult<BTreeMap<u64, Block>> {
    let mut blocks: BTreeMap<u64, Block> = BTreeMap::new();
    for u in updates {
        if u.addr.is_whole_block() {
            blocks.insert(u.addr.blkno, u.payload.clone());
            continue;
        }
        let blk = match blocks.get_mut(&u.addr.blkno) {
            Some(blk) => blk,
            None => {
                let base = source.read_block(u.addr.blkno)?;
                blocks.entry(u.addr.blkno).or_insert(base)
            }
        };
        u.apply_to(blk);
    }
    Ok(blocks)
}
