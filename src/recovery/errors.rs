//! Recovery error types
//!
//! Error codes:
//! - BJ_RECOVERY_LOG_CORRUPTION (FATAL)
//! - BJ_RECOVERY_REPLAY_FAILED (FATAL)
//! - BJ_RECOVERY_FAILED (FATAL)

use std::error::Error as StdError;
use std::fmt;

use crate::disk::DiskError;
use crate::wal::WalError;

/// Severity levels for recovery errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The journal must not be opened
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Recovery-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryErrorCode {
    /// Log headers or descriptors are inconsistent
    BjRecoveryLogCorruption,
    /// Installing the recovered log into the data region failed
    BjRecoveryReplayFailed,
    /// General recovery failure
    BjRecoveryFailed,
}

impl RecoveryErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryErrorCode::BjRecoveryLogCorruption => "BJ_RECOVERY_LOG_CORRUPTION",
            RecoveryErrorCode::BjRecoveryReplayFailed => "BJ_RECOVERY_REPLAY_FAILED",
            RecoveryErrorCode::BjRecoveryFailed => "BJ_RECOVERY_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for RecoveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Recovery error type with full context
#[derive(Debug)]
pub struct RecoveryError {
    /// Error code
    code: RecoveryErrorCode,
    /// Human-readable message
    message: String,
    /// Block involved, if known
    blkno: Option<u64>,
    /// Underlying error
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl RecoveryError {
    /// On-disk log failed validation
    pub fn log_corruption(err: WalError) -> Self {
        Self {
            code: RecoveryErrorCode::BjRecoveryLogCorruption,
            message: err.message().to_string(),
            blkno: None,
            source: Some(Box::new(err)),
        }
    }

    /// Writing the recovered log to the data region failed
    pub fn replay_failed(reason: impl Into<String>, err: DiskError) -> Self {
        Self {
            code: RecoveryErrorCode::BjRecoveryReplayFailed,
            message: reason.into(),
            blkno: err.blkno(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a general recovery failed error
    pub fn recovery_failed(reason: impl Into<String>) -> Self {
        Self {
            code: RecoveryErrorCode::BjRecoveryFailed,
            message: reason.into(),
            blkno: None,
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> RecoveryErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the block involved, if known
    pub fn blkno(&self) -> Option<u64> {
        self.blkno
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(blkno) = self.blkno {
            write!(f, " (blkno: {})", blkno)?;
        }
        Ok(())
    }
}

impl StdError for RecoveryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RecoveryErrorCode::BjRecoveryLogCorruption.code(),
            "BJ_RECOVERY_LOG_CORRUPTION"
        );
        assert_eq!(
            RecoveryErrorCode::BjRecoveryReplayFailed.code(),
            "BJ_RECOVERY_REPLAY_FAILED"
        );
        assert_eq!(RecoveryErrorCode::BjRecoveryFailed.code(), "BJ_RECOVERY_FAILED");
    }

    #[test]
    fn test_all_errors_are_fatal() {
        let err = RecoveryError::recovery_failed("boom");
        assert!(err.is_fatal());
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_replay_failed_keeps_block() {
        let err = RecoveryError::replay_failed("write failed", DiskError::Injected(17));
        assert_eq!(err.blkno(), Some(17));
        let display = format!("{}", err);
        assert!(display.contains("BJ_RECOVERY_REPLAY_FAILED"));
        assert!(display.contains("blkno: 17"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_log_corruption_wraps_wal_error() {
        let err = RecoveryError::log_corruption(WalError::corruption("bad magic"));
        assert_eq!(err.message(), "bad magic");
        assert!(format!("{}", err).contains("FATAL"));
    }
}
