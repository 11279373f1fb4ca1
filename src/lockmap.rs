//! Per-entity lock manager
//!
//! Entity ids hash onto a fixed set of shards. Each shard holds a map of
//! the ids currently held or waited on, guarded by one mutex and one
//! condition variable; an id's entry is removed as soon as it is free with
//! no waiters, so memory is bounded by the number of ids in use.
//!
//! These locks are independent of the journal's internal locks. An
//! operation should hold at most one of them.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};

/// Number of shards.
pub const NSHARD: usize = 43;

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    waiters: usize,
}

#[derive(Debug, Default)]
struct Shard {
    ids: Mutex<HashMap<u64, LockState>>,
    cv: Condvar,
}

/// Striped table of exclusive per-entity locks.
#[derive(Debug)]
pub struct LockMap {
    shards: Vec<Shard>,
}

impl Default for LockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl LockMap {
    pub fn new() -> Self {
        Self {
            shards: (0..NSHARD).map(|_| Shard::default()).collect(),
        }
    }

    fn shard(&self, id: u64) -> &Shard {
        &self.shards[(id % NSHARD as u64) as usize]
    }

    /// Blocks until `id` is free, then holds it until the guard drops.
    pub fn acquire(&self, id: u64) -> LockGuard<'_> {
        let shard = self.shard(id);
        let mut ids = shard.ids.lock();
        loop {
            let st = ids.entry(id).or_default();
            if !st.held {
                st.held = true;
                return LockGuard { map: self, id };
            }
            st.waiters += 1;
            shard.cv.wait(&mut ids);
            if let Some(st) = ids.get_mut(&id) {
                st.waiters -= 1;
            }
        }
    }

    /// Takes `id` only if it is free right now.
    pub fn try_acquire(&self, id: u64) -> Option<LockGuard<'_>> {
        let mut ids = self.shard(id).ids.lock();
        let st = ids.entry(id).or_default();
        if st.held {
            return None;
        }
        st.held = true;
        Some(LockGuard { map: self, id })
    }

    fn release(&self, id: u64) {
        let shard = self.shard(id);
        let mut ids = shard.ids.lock();
        let waiters = match ids.get_mut(&id) {
            Some(st) => {
                st.held = false;
                st.waiters
            }
            None => return,
        };
        if waiters == 0 {
            ids.remove(&id);
        } else {
            shard.cv.notify_all();
        }
    }

    /// Number of ids currently held or waited on.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.ids.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one entity id; released on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    map: &'a LockMap,
    id: u64,
}

impl LockGuard<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.map.release(self.id);
    }
}
