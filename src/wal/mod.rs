//! Write-ahead log
//!
//! Committed batches live in an in-memory log until the installer has
//! written them to the data region. A logger thread copies them into a
//! bounded circular region on disk first; a batch is durable once the end
//! header covering it is synced.
//!
//! # Guarantees
//!
//! - A batch is appended atomically: readers see all of it or none of it
//! - `commit(.., true)` returns only after the batch is durable
//! - The data region always holds a commit-order prefix of the log
//! - The on-disk `start` advances only after installed blocks are synced
//! - The metadata lock is never held across device I/O

pub(crate) mod circular;
mod config;
mod engine;
mod errors;
mod installer;
mod logger;
mod memlog;
mod record;
mod stats;

pub use circular::{LogLayout, MAX_LOG_SIZE};
pub use config::{ConfigError, JournalConfig};
pub use engine::Wal;
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use record::{LogBatch, LogPosition, Update};
pub use stats::{WalStats, WalStatsSnapshot};

pub(crate) use installer::DataRegion;
