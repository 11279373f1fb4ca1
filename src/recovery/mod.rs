//! Recovery subsystem
//!
//! Runs inside `Wal::open`, before any transaction is accepted: the
//! durable part of the circular log is re-installed into the data region
//! and the log is emptied.
//!
//! # Invariants
//!
//! - Only updates below the durable `end` are replayed
//! - Replay is idempotent
//! - Any header inconsistency is FATAL; nothing is repaired silently

mod errors;
mod replay;
mod startup;

pub use errors::{RecoveryError, RecoveryErrorCode, RecoveryResult, Severity};
pub use replay::{LogReplayer, ReplayStats};
pub use startup::{RecoveryManager, RecoveryState};
