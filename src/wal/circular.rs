//! On-disk circular log region
//!
//! Layout:
//!
//! ```text
//! block 0            end header: magic, log_size, end, one descriptor per slot, crc32
//! block 1            start header: magic, start, crc32
//! blocks 2..2+N      log slots; position p lives in slot p % N
//! blocks 2+N..       data region
//! ```
//!
//! A descriptor is `(blkno u64, off u32, sz u32)`; the slot holds the
//! block-sized payload. Writing the end header is the commit point of an
//! append: slots are written and synced first, then the header, then a
//! second sync. The start header is advanced only by the installer, after
//! the installed data is synced.

use tracing::debug;

use super::errors::{WalError, WalResult};
use super::record::{LogPosition, Update};
use crate::block::{Addr, Block, BLOCK_SIZE};
use crate::crash_point::{maybe_crash, points};
use crate::disk::{Disk, DiskResult};

/// Block holding the end header
pub const END_HEADER_BLOCK: u64 = 0;
/// Block holding the start header
pub const START_HEADER_BLOCK: u64 = 1;
/// First log slot
pub const LOG_START: u64 = 2;

const END_MAGIC: u64 = 0x424a_4c4f_4745_4e44;
const START_MAGIC: u64 = 0x424a_4c4f_4753_5441;
const END_FIXED: usize = 24;
const DESC_SIZE: usize = 16;
const CRC_OFFSET: usize = BLOCK_SIZE - 4;

/// Largest number of slots whose descriptors fit in the end header.
pub const MAX_LOG_SIZE: u64 = ((CRC_OFFSET - END_FIXED) / DESC_SIZE) as u64;

/// Geometry of the log and data regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLayout {
    log_size: u64,
}

impl LogLayout {
    pub fn new(log_size: u64) -> Self {
        debug_assert!(log_size > 0 && log_size <= MAX_LOG_SIZE);
        Self { log_size }
    }

    /// Number of log slots.
    pub fn log_size(&self) -> u64 {
        self.log_size
    }

    /// Device block holding log position `pos`.
    pub fn slot_block(&self, pos: LogPosition) -> u64 {
        LOG_START + pos % self.log_size
    }

    /// First block of the data region.
    pub fn data_start(&self) -> u64 {
        LOG_START + self.log_size
    }
}

fn put_u64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(b)
}

fn seal(blk: &mut Block) {
    let crc = crc32fast::hash(&blk[..CRC_OFFSET]);
    put_u32(blk, CRC_OFFSET, crc);
}

fn check_seal(blk: &Block, blkno: u64) -> WalResult<()> {
    let stored = get_u32(blk, CRC_OFFSET);
    let actual = crc32fast::hash(&blk[..CRC_OFFSET]);
    if stored != actual {
        return Err(WalError::corruption_at_block(
            blkno,
            format!(
                "Header checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored, actual
            ),
        ));
    }
    Ok(())
}

fn encode_end(log_size: u64, end: LogPosition, descs: &[Addr]) -> Block {
    let mut blk = Block::zeroed();
    put_u64(&mut blk, 0, END_MAGIC);
    put_u32(&mut blk, 8, log_size as u32);
    put_u64(&mut blk, 16, end);
    for (i, d) in descs.iter().enumerate() {
        let at = END_FIXED + i * DESC_SIZE;
        put_u64(&mut blk, at, d.blkno);
        put_u32(&mut blk, at + 8, d.off as u32);
        put_u32(&mut blk, at + 12, d.sz as u32);
    }
    seal(&mut blk);
    blk
}

fn encode_start(start: LogPosition) -> Block {
    let mut blk = Block::zeroed();
    put_u64(&mut blk, 0, START_MAGIC);
    put_u64(&mut blk, 8, start);
    seal(&mut blk);
    blk
}

/// Writes fresh, empty headers for a log of `log_size` slots.
pub fn format(disk: &dyn Disk, layout: LogLayout) -> DiskResult<()> {
    let descs = vec![Addr::new(0, 0, 0); layout.log_size() as usize];
    disk.write(START_HEADER_BLOCK, &encode_start(0))?;
    disk.write(END_HEADER_BLOCK, &encode_end(layout.log_size(), 0, &descs))?;
    disk.barrier()
}

/// Durably records that everything below `start` is installed.
pub fn write_start(disk: &dyn Disk, start: LogPosition) -> DiskResult<()> {
    disk.write(START_HEADER_BLOCK, &encode_start(start))?;
    disk.barrier()
}

/// Logger-side mirror of the end header.
///
/// Only the logger appends, so the mirror needs no locking of its own.
#[derive(Debug)]
pub struct Appender {
    layout: LogLayout,
    end: LogPosition,
    descs: Vec<Addr>,
}

impl Appender {
    /// Durable end of the log.
    pub fn end(&self) -> LogPosition {
        self.end
    }

    /// Appends `updates` at positions `[end, end + len)` and makes them
    /// durable. On error the in-memory mirror is unchanged.
    pub fn append(&mut self, disk: &dyn Disk, updates: &[Update]) -> DiskResult<LogPosition> {
        let mut descs = self.descs.clone();
        for (i, u) in updates.iter().enumerate() {
            let pos = self.end + i as u64;
            disk.write(self.layout.slot_block(pos), &u.payload)?;
            descs[(pos % self.layout.log_size()) as usize] = u.addr;
        }
        disk.barrier()?;
        maybe_crash(points::LOGGER_BEFORE_END_HEADER);

        let end = self.end + updates.len() as u64;
        disk.write(
            END_HEADER_BLOCK,
            &encode_end(self.layout.log_size(), end, &descs),
        )?;
        disk.barrier()?;
        maybe_crash(points::LOGGER_AFTER_END_HEADER);

        self.end = end;
        self.descs = descs;
        Ok(end)
    }

    /// Rewrites the end header from the mirror, undoing a half-finished
    /// append.
    pub fn restore(&self, disk: &dyn Disk) -> DiskResult<()> {
        disk.write(
            END_HEADER_BLOCK,
            &encode_end(self.layout.log_size(), self.end, &self.descs),
        )?;
        disk.barrier()
    }
}

/// Log contents read back at open.
#[derive(Debug)]
pub struct RecoveredLog {
    pub layout: LogLayout,
    pub start: LogPosition,
    pub end: LogPosition,
    /// Updates in `[start, end)`, oldest first
    pub updates: Vec<Update>,
    pub appender: Appender,
}

/// Reads and validates both headers and every live slot.
pub fn recover(disk: &dyn Disk) -> WalResult<RecoveredLog> {
    let start_blk = disk
        .read(START_HEADER_BLOCK)
        .map_err(|e| WalError::corruption_io("Failed to read start header", e))?;
    let end_blk = disk
        .read(END_HEADER_BLOCK)
        .map_err(|e| WalError::corruption_io("Failed to read end header", e))?;

    if get_u64(&start_blk, 0) != START_MAGIC || get_u64(&end_blk, 0) != END_MAGIC {
        return Err(WalError::corruption_at_block(
            END_HEADER_BLOCK,
            "Log headers missing or bad magic; device not formatted",
        ));
    }
    check_seal(&start_blk, START_HEADER_BLOCK)?;
    check_seal(&end_blk, END_HEADER_BLOCK)?;

    let log_size = u64::from(get_u32(&end_blk, 8));
    if log_size == 0 || log_size > MAX_LOG_SIZE {
        return Err(WalError::corruption_at_block(
            END_HEADER_BLOCK,
            format!("Invalid log size {}", log_size),
        ));
    }
    let layout = LogLayout::new(log_size);
    if layout.data_start() >= disk.size() {
        return Err(WalError::corruption(format!(
            "Device of {} blocks has no data region after a {}-slot log",
            disk.size(),
            log_size
        )));
    }

    let start = get_u64(&start_blk, 8);
    let end = get_u64(&end_blk, 16);
    if start > end || end - start > log_size {
        return Err(WalError::corruption(format!(
            "Inconsistent log positions: start {}, end {}, size {}",
            start, end, log_size
        )));
    }

    let descs: Vec<Addr> = (0..log_size as usize)
        .map(|i| {
            let at = END_FIXED + i * DESC_SIZE;
            Addr::new(
                get_u64(&end_blk, at),
                u64::from(get_u32(&end_blk, at + 8)),
                u64::from(get_u32(&end_blk, at + 12)),
            )
        })
        .collect();

    let mut updates = Vec::with_capacity((end - start) as usize);
    for pos in start..end {
        let addr = descs[(pos % log_size) as usize];
        if !addr.is_valid() || addr.blkno < layout.data_start() || addr.blkno >= disk.size() {
            return Err(WalError::corruption_at_block(
                END_HEADER_BLOCK,
                format!("Invalid descriptor {} at position {}", addr, pos),
            ));
        }
        let slot = layout.slot_block(pos);
        let payload = disk
            .read(slot)
            .map_err(|e| WalError::corruption_io(format!("Failed to read log slot {}", slot), e))?;
        updates.push(Update::new(addr, payload));
    }

    debug!(start, end, log_size, "read circular log");

    Ok(RecoveredLog {
        layout,
        start,
        end,
        updates,
        appender: Appender { layout, end, descs },
    })
}
