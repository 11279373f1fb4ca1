//! blockjournal - crash-safe journaled block storage
//!
//! A write-ahead log over a block device, bit-granular update merging, an
//! atomic transaction layer, per-entity locks, and a minimal filesystem
//! built from them.

pub mod block;
pub mod buf;
pub mod cli;
pub mod crash_point;
pub mod disk;
pub mod fs;
pub mod lockmap;
pub mod recovery;
pub mod txn;
pub mod wal;
