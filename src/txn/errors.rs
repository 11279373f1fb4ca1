//! Transaction errors

use thiserror::Error;

use crate::block::Addr;
use crate::wal::WalError;

/// Result type for operations on an `Op`
pub type TxnResult<T> = Result<T, TxnError>;

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("invalid address {0}")]
    InvalidAddress(Addr),

    #[error("payload for {addr} has {got} bytes, expected {expected}")]
    PayloadSize {
        addr: Addr,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Wal(#[from] WalError),
}

impl TxnError {
    /// True when the journal itself can no longer make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TxnError::Wal(e) if e.is_fatal())
    }
}
