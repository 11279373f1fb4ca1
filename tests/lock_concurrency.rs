//! Concurrency tests for the filesystem and the journal
//!
//! Writes to one inode read-modify-write its whole data block, so only
//! the per-inode lock keeps concurrent writers from losing each other's
//! bytes. Writes to different inodes run in parallel.

use std::sync::Arc;
use std::thread;

use blockjournal::block::{Addr, Block, BLOCK_SIZE};
use blockjournal::disk::MemDisk;
use blockjournal::fs::{Filesystem, FsStatus, WriteArgs};
use blockjournal::lockmap::LockMap;
use blockjournal::wal::{JournalConfig, Update, Wal};

// =============================================================================
// Test Utilities
// =============================================================================

const NINODES: u64 = 16;
const THREADS: usize = 8;

fn shared_fs() -> Arc<Filesystem> {
    let config = JournalConfig {
        install_interval_ms: 5,
        ..JournalConfig::with_log_size(16)
    };
    let disk = Arc::new(MemDisk::new(128));
    Wal::format(&*disk, &config).unwrap();
    let wal = Wal::open(disk, config).unwrap();
    Arc::new(Filesystem::new(Arc::new(wal), NINODES).unwrap())
}

// =============================================================================
// Same Inode
// =============================================================================

#[test]
fn test_concurrent_writes_to_one_inode_are_not_lost() {
    let fs = shared_fs();
    let span = 64;
    let zeros = vec![0u8; span * THREADS];
    assert_eq!(fs.write(&WriteArgs::new(0, 0, zeros)).status, FsStatus::Ok);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                // one byte at a time so writers interleave
                for i in 0..span {
                    let off = (t * span + i) as u64;
                    let reply = fs.write(&WriteArgs::new(0, off, vec![t as u8 + 1]));
                    assert_eq!(reply.status, FsStatus::Ok);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let data = fs.read(0, 0, (span * THREADS) as u64).data;
    for t in 0..THREADS {
        assert!(
            data[t * span..(t + 1) * span].iter().all(|b| *b == t as u8 + 1),
            "writer {} lost bytes",
            t
        );
    }
    assert_eq!(fs.getattr(0).unwrap().size, (span * THREADS) as u64);
}

// =============================================================================
// Different Inodes
// =============================================================================

#[test]
fn test_parallel_writers_on_distinct_inodes() {
    let fs = shared_fs();

    let handles: Vec<_> = (0..NINODES)
        .map(|inum| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                for i in 0..20u64 {
                    let reply = fs.write(&WriteArgs::new(inum, i, vec![inum as u8]));
                    assert_eq!(reply.status, FsStatus::Ok);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for inum in 0..NINODES {
        assert_eq!(fs.getattr(inum).unwrap().size, 20);
        assert_eq!(fs.read(inum, 0, 20).data, vec![inum as u8; 20]);
    }
    fs.wal().shutdown().unwrap();
    assert_eq!(fs.wal().pending(), 0);
}

// =============================================================================
// Journal Readers
// =============================================================================

#[test]
fn test_readers_see_whole_committed_blocks_during_installs() {
    let config = JournalConfig {
        install_interval_ms: 1,
        install_threshold: 1,
        ..JournalConfig::with_log_size(8)
    };
    let disk = Arc::new(MemDisk::new(32));
    Wal::format(&*disk, &config).unwrap();
    let wal = Arc::new(Wal::open(disk, config).unwrap());
    let blk = wal.data_start();

    let writer = {
        let wal = Arc::clone(&wal);
        thread::spawn(move || {
            for v in 1..=200u32 {
                let fill = (v % 251) as u8;
                let update = Update::whole_block(blk, Block::with_prefix(&[fill; BLOCK_SIZE]));
                wal.commit(vec![update], v % 3 == 0).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                for _ in 0..500 {
                    let b = wal.read(blk).unwrap();
                    assert!(b.iter().all(|x| *x == b[0]), "torn block read");
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(wal.read(blk).unwrap()[0], (200 % 251) as u8);
}

#[test]
fn test_partial_update_readers_keep_up_with_installs() {
    let config = JournalConfig {
        install_interval_ms: 1,
        install_threshold: 1,
        ..JournalConfig::with_log_size(8)
    };
    let disk = Arc::new(MemDisk::new(32));
    Wal::format(&*disk, &config).unwrap();
    let wal = Arc::new(Wal::open(disk, config).unwrap());
    let blk = wal.data_start();

    // each round leaves a partial update on top of a whole-block one, so
    // readers often fold over a base that an install is rewriting
    let writer = {
        let wal = Arc::clone(&wal);
        thread::spawn(move || {
            for v in 1..=150u32 {
                let fill = (v % 251) as u8;
                let whole = Update::whole_block(blk, Block::with_prefix(&[fill; 64]));
                wal.commit(vec![whole], false).unwrap();
                let head = Update::from_packed(Addr::bytes(blk, 0, 1), &[fill]);
                wal.commit(vec![head], v % 2 == 0).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                for _ in 0..500 {
                    let b = wal.read(blk).unwrap();
                    assert!(b[..64].iter().all(|x| *x == b[0]), "stale base under head");
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(wal.read(blk).unwrap()[..64], [150u8; 64]);
}

// =============================================================================
// Lock Table
// =============================================================================

#[test]
fn test_lock_table_empty_after_contention() {
    let locks = Arc::new(LockMap::new());
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                for i in 0..500u64 {
                    let _g = locks.acquire((i + t as u64) % 7);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(locks.is_empty());
}
