//! Transactions
//!
//! An `Op` is the unit of atomicity: every write staged through it becomes
//! durable together, or none does.

mod errors;
mod op;

pub use errors::{TxnError, TxnResult};
pub use op::Op;
