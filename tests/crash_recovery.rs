//! Crash recovery tests
//!
//! A crash is modeled by copying the in-memory device at some moment and
//! reopening the journal on the copy. Write budgets cut the device off in
//! the middle of a logger or installer pass.
//!
//! After every crash the data region seen through a fresh journal must
//! equal the result of some prefix of the committed operations, and that
//! prefix must include every operation whose commit returned durable.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use blockjournal::block::{Addr, Block};
use blockjournal::disk::{Disk, MemDisk};
use blockjournal::recovery::RecoveryErrorCode;
use blockjournal::wal::{JournalConfig, Update, Wal};

// =============================================================================
// Test Utilities
// =============================================================================

const DISK_BLOCKS: u64 = 48;
const LOG_SIZE: u64 = 8;
const DATA_BLOCKS: u64 = 6;

fn config() -> JournalConfig {
    JournalConfig {
        install_interval_ms: 2,
        logger_interval_ms: 2,
        commit_timeout_ms: 1000,
        ..JournalConfig::with_log_size(LOG_SIZE)
    }
}

fn quiet_config() -> JournalConfig {
    JournalConfig {
        install_interval_ms: 60_000,
        logger_interval_ms: 60_000,
        install_threshold: LOG_SIZE,
        ..JournalConfig::with_log_size(LOG_SIZE)
    }
}

fn formatted(config: &JournalConfig) -> Arc<MemDisk> {
    let disk = Arc::new(MemDisk::new(DISK_BLOCKS));
    Wal::format(&*disk, config).unwrap();
    disk
}

fn reopen(disk: &MemDisk, config: JournalConfig) -> Wal {
    Wal::open(Arc::new(disk.snapshot()), config).unwrap()
}

/// Expected block contents, keyed by block number.
type Model = BTreeMap<u64, Block>;

fn apply(model: &mut Model, batch: &[Update]) {
    for u in batch {
        let blk = model.entry(u.addr.blkno).or_default();
        u.apply_to(blk);
    }
}

/// One or two random updates over a few data blocks, some partial.
fn random_batch(rng: &mut StdRng, data_start: u64) -> Vec<Update> {
    (0..rng.gen_range(1..=2))
        .map(|_| {
            let blkno = data_start + rng.gen_range(0..DATA_BLOCKS);
            if rng.gen_bool(0.5) {
                let fill = rng.gen::<u8>();
                Update::whole_block(blkno, Block::with_prefix(&[fill; 32]))
            } else {
                let off = rng.gen_range(0..32);
                let len = rng.gen_range(1..=8);
                let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                Update::from_packed(Addr::bytes(blkno, off, len), &bytes)
            }
        })
        .collect()
}

fn observed(wal: &Wal) -> Model {
    let start = wal.data_start();
    (start..start + DATA_BLOCKS)
        .map(|b| (b, wal.read(b).unwrap()))
        .collect()
}

fn normalized(model: &Model, data_start: u64) -> Model {
    (data_start..data_start + DATA_BLOCKS)
        .map(|b| (b, model.get(&b).cloned().unwrap_or_default()))
        .collect()
}

// =============================================================================
// Durable Prefix
// =============================================================================

#[test]
fn test_acknowledged_commits_survive_crash() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();

    for i in 0..5u64 {
        wal.commit(
            vec![Update::whole_block(blk + i, Block::with_prefix(&[i as u8 + 1]))],
            true,
        )
        .unwrap();
    }

    let recovered = reopen(&disk, config);
    for i in 0..5u64 {
        assert_eq!(recovered.read(blk + i).unwrap()[0], i as u8 + 1);
    }
    assert_eq!(recovered.recovery_stats().entries_replayed, 5);
    assert_eq!(recovered.pending(), 0);
}

#[test]
fn test_unlogged_commit_lost_on_crash() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();

    wal.commit(vec![Update::whole_block(blk, Block::with_prefix(&[1]))], true)
        .unwrap();
    wal.commit(vec![Update::whole_block(blk, Block::with_prefix(&[2]))], false)
        .unwrap();
    assert_eq!(wal.read(blk).unwrap()[0], 2);

    let recovered = reopen(&disk, config.clone());
    assert_eq!(recovered.read(blk).unwrap()[0], 1);

    wal.log_now().unwrap();
    let recovered = reopen(&disk, config);
    assert_eq!(recovered.read(blk).unwrap()[0], 2);
}

#[test]
fn test_crash_during_append_keeps_previous_state() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();

    wal.commit(vec![Update::whole_block(blk, Block::with_prefix(&[1]))], true)
        .unwrap();

    // two slot writes land, the end header does not
    disk.crash_after_writes(2);
    let batch = vec![
        Update::whole_block(blk, Block::with_prefix(&[2])),
        Update::whole_block(blk + 1, Block::with_prefix(&[2])),
    ];
    assert!(wal.commit(batch, true).is_err());

    let recovered = reopen(&disk, config);
    assert_eq!(recovered.read(blk).unwrap()[0], 1);
    assert_eq!(recovered.read(blk + 1).unwrap()[0], 0);
    assert_eq!(recovered.recovery_stats().end, 1);
    disk.clear_faults();
}

// =============================================================================
// Install Crashes
// =============================================================================

#[test]
fn test_crash_between_install_and_start_advance() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();

    wal.commit(
        vec![
            Update::whole_block(blk, Block::with_prefix(&[4; 8])),
            Update::from_packed(Addr::bytes(blk, 2, 2), &[7, 7]),
        ],
        true,
    )
    .unwrap();

    // data blocks are written, the start header is not
    disk.fail_writes_in(1..2);
    assert!(wal.install().is_err());
    assert_eq!(disk.read(blk).unwrap()[2], 7);

    let recovered = reopen(&disk, config);
    assert_eq!(recovered.recovery_stats().entries_replayed, 2);
    assert_eq!(&recovered.read(blk).unwrap()[..5], &[4, 4, 7, 7, 4]);
    disk.clear_faults();
}

#[test]
fn test_crash_during_install_is_replayed() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();

    let batch: Vec<Update> = (0..4)
        .map(|i| Update::whole_block(blk + i, Block::with_prefix(&[9])))
        .collect();
    wal.commit(batch, true).unwrap();

    disk.crash_after_writes(1);
    assert!(wal.install().is_err());

    let recovered = reopen(&disk, config);
    for i in 0..4 {
        assert_eq!(recovered.read(blk + i).unwrap()[0], 9);
    }
    disk.clear_faults();
}

#[test]
fn test_crash_during_recovery_then_recover_again() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();

    let batch: Vec<Update> = (0..3)
        .map(|i| Update::whole_block(blk + i, Block::with_prefix(&[i as u8 + 5])))
        .collect();
    wal.commit(batch, true).unwrap();

    let crashed = disk.snapshot();
    crashed.crash_after_writes(1);
    let crashed = Arc::new(crashed);
    let err = Wal::open(crashed.clone(), config.clone()).unwrap_err();
    assert_eq!(err.code(), RecoveryErrorCode::BjRecoveryReplayFailed);

    let recovered = reopen(&crashed, config);
    assert_eq!(recovered.recovery_stats().entries_replayed, 3);
    for i in 0..3 {
        assert_eq!(recovered.read(blk + i).unwrap()[0], i as u8 + 5);
    }
}

#[test]
fn test_recovery_is_idempotent() {
    let config = quiet_config();
    let disk = formatted(&config);
    let wal = Wal::open(disk.clone(), config.clone()).unwrap();
    let blk = wal.data_start();
    wal.commit(vec![Update::from_packed(Addr::new(blk, 3, 1), &[1])], true)
        .unwrap();

    let crashed = Arc::new(disk.snapshot());
    let first = Wal::open(crashed.clone(), config.clone()).unwrap();
    assert_eq!(first.recovery_stats().entries_replayed, 1);
    let after_first = observed(&first);
    first.shutdown().unwrap();
    drop(first);

    let second = Wal::open(crashed, config).unwrap();
    assert_eq!(second.recovery_stats().entries_replayed, 0);
    assert_eq!(observed(&second), after_first);
    assert_eq!(second.read(blk).unwrap()[0], 0b1000);
}

// =============================================================================
// Randomized Crashes
// =============================================================================

#[test]
fn test_random_crashes_recover_a_committed_prefix() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..20 {
        let config = config();
        let disk = formatted(&config);
        let wal = Wal::open(disk.clone(), config.clone()).unwrap();
        let data_start = wal.data_start();

        // prefixes[n] is the model after the first n operations
        let mut prefixes = vec![Model::new()];
        let mut durable = 0;
        let crash_at = rng.gen_range(0..30);
        disk.crash_after_writes(rng.gen_range(5..60));

        for n in 0..30 {
            let batch = random_batch(&mut rng, data_start);
            let wait = rng.gen_bool(0.7);
            let mut next = prefixes[prefixes.len() - 1].clone();
            apply(&mut next, &batch);
            match wal.commit(batch, wait) {
                Ok(_) => {
                    prefixes.push(next);
                    if wait {
                        durable = prefixes.len() - 1;
                    }
                }
                Err(_) => break,
            }
            if n == crash_at {
                break;
            }
        }

        let recovered = reopen(&disk, config);
        let seen = observed(&recovered);
        let matched = prefixes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| normalized(m, data_start) == seen)
            .map(|(n, _)| n);

        match matched {
            Some(n) => assert!(
                n >= durable,
                "round {}: recovered prefix {} lost durable prefix {}",
                round,
                n,
                durable
            ),
            None => panic!("round {}: recovered state matches no committed prefix", round),
        }
        disk.clear_faults();
    }
}
