//! In-memory log
//!
//! Holds every committed update that is not yet installed, in commit order.
//! `start` is the position of the first entry; entries below it have been
//! installed and trimmed.

use std::collections::VecDeque;

use super::record::{LogPosition, Update};

#[derive(Debug, Default)]
pub struct MemLog {
    start: LogPosition,
    entries: VecDeque<Update>,
}

impl MemLog {
    pub fn new(start: LogPosition) -> Self {
        Self {
            start,
            entries: VecDeque::new(),
        }
    }

    pub fn start(&self) -> LogPosition {
        self.start
    }

    pub fn end(&self) -> LogPosition {
        self.start + self.entries.len() as u64
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn append(&mut self, batch: Vec<Update>) {
        self.entries.extend(batch);
    }

    /// Copies the entries in `[from, to)`.
    pub fn slice(&self, from: LogPosition, to: LogPosition) -> Vec<Update> {
        let from = from.max(self.start);
        let to = to.min(self.end());
        if from >= to {
            return Vec::new();
        }
        let lo = (from - self.start) as usize;
        let hi = (to - self.start) as usize;
        self.entries.range(lo..hi).cloned().collect()
    }

    /// Drops installed entries below `pos`.
    pub fn trim_to(&mut self, pos: LogPosition) {
        while self.start < pos && self.entries.pop_front().is_some() {
            self.start += 1;
        }
    }

    /// Discards every entry at or above `pos`.
    pub fn truncate_to(&mut self, pos: LogPosition) {
        let keep = pos.saturating_sub(self.start) as usize;
        self.entries.truncate(keep);
    }

    /// Updates touching `blkno` that decide its current value: the newest
    /// whole-block update (if any) and everything after it, oldest first.
    pub fn updates_for(&self, blkno: u64) -> Vec<Update> {
        let mut found = Vec::new();
        for u in self.entries.iter().rev() {
            if u.addr.blkno != blkno {
                continue;
            }
            found.push(u.clone());
            if u.addr.is_whole_block() {
                break;
            }
        }
        found.reverse();
        found
    }
}
