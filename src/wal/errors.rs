//! WAL error types
//!
//! Error codes:
//! - BJ_WAL_LOG_FULL (ERROR severity)
//! - BJ_WAL_INVALID_ADDRESS (ERROR severity)
//! - BJ_WAL_APPEND_FAILED (ERROR severity)
//! - BJ_WAL_READ_FAILED (ERROR severity)
//! - BJ_WAL_INSTALL_FAILED (ERROR severity)
//! - BJ_WAL_CLOSED (ERROR severity)
//! - BJ_WAL_INVALID_CONFIG (ERROR severity)
//! - BJ_WAL_DEVICE_FAILED (FATAL severity)
//! - BJ_WAL_CORRUPTION (FATAL severity)

use std::fmt;

use crate::disk::DiskError;

/// Severity levels for WAL errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, journal continues
    Error,
    /// Journal can no longer guarantee durability
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// WAL-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// Batch does not fit in the circular log
    BjWalLogFull,
    /// Update address outside the data region or the block
    BjWalInvalidAddress,
    /// Durable append of a batch failed; the batch was discarded
    BjWalAppendFailed,
    /// Reading a block through the log failed
    BjWalReadFailed,
    /// An install pass failed; it will be retried
    BjWalInstallFailed,
    /// The journal has been shut down
    BjWalClosed,
    /// Journal config or device geometry rejected
    BjWalInvalidConfig,
    /// The log header could not be restored after a failed append
    BjWalDeviceFailed,
    /// On-disk log is inconsistent
    BjWalCorruption,
}

impl WalErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::BjWalLogFull => "BJ_WAL_LOG_FULL",
            WalErrorCode::BjWalInvalidAddress => "BJ_WAL_INVALID_ADDRESS",
            WalErrorCode::BjWalAppendFailed => "BJ_WAL_APPEND_FAILED",
            WalErrorCode::BjWalReadFailed => "BJ_WAL_READ_FAILED",
            WalErrorCode::BjWalInstallFailed => "BJ_WAL_INSTALL_FAILED",
            WalErrorCode::BjWalClosed => "BJ_WAL_CLOSED",
            WalErrorCode::BjWalInvalidConfig => "BJ_WAL_INVALID_CONFIG",
            WalErrorCode::BjWalDeviceFailed => "BJ_WAL_DEVICE_FAILED",
            WalErrorCode::BjWalCorruption => "BJ_WAL_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::BjWalDeviceFailed | WalErrorCode::BjWalCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// WAL error type with full context
#[derive(Debug)]
pub struct WalError {
    /// Error code
    code: WalErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying device error if applicable
    source: Option<DiskError>,
}

impl WalError {
    fn new(code: WalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    fn with_source(mut self, source: DiskError) -> Self {
        self.source = Some(source);
        self
    }

    fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    /// Batch of `needed` slots does not fit a log of `capacity` slots
    pub fn log_full(needed: usize, capacity: u64) -> Self {
        Self::new(WalErrorCode::BjWalLogFull, "No space in circular log")
            .with_details(format!("needed: {}, capacity: {}", needed, capacity))
    }

    /// Update addresses something outside the data region
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::BjWalInvalidAddress, message)
    }

    /// Durable append failed
    pub fn append_failed(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::BjWalAppendFailed, message)
    }

    /// Durable append failed with a device error
    pub fn append_io(message: impl Into<String>, source: DiskError) -> Self {
        Self::append_failed(message).with_source(source)
    }

    /// Read through the log failed
    pub fn read_failed(blkno: u64, source: DiskError) -> Self {
        Self::new(WalErrorCode::BjWalReadFailed, "Failed to read block")
            .with_details(format!("blkno: {}", blkno))
            .with_source(source)
    }

    /// Install pass failed
    pub fn install_failed(message: impl Into<String>, source: DiskError) -> Self {
        Self::new(WalErrorCode::BjWalInstallFailed, message).with_source(source)
    }

    /// Journal is shut down
    pub fn closed() -> Self {
        Self::new(WalErrorCode::BjWalClosed, "Journal is shut down")
    }

    /// Config or geometry rejected before formatting
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::BjWalInvalidConfig, message)
    }

    /// Device left the log header in an unknown state
    pub fn device_failed(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::BjWalDeviceFailed, message)
    }

    /// On-disk log is corrupt
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(WalErrorCode::BjWalCorruption, message)
    }

    /// On-disk log is corrupt at a given block
    pub fn corruption_at_block(blkno: u64, reason: impl Into<String>) -> Self {
        Self::corruption(reason).with_details(format!("blkno: {}", blkno))
    }

    /// Device error while reading the log during open
    pub fn corruption_io(message: impl Into<String>, source: DiskError) -> Self {
        Self::corruption(message).with_source(source)
    }

    /// Returns the error code
    pub fn code(&self) -> WalErrorCode {
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

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(WalErrorCode::BjWalLogFull.code(), "BJ_WAL_LOG_FULL");
        assert_eq!(WalErrorCode::BjWalAppendFailed.code(), "BJ_WAL_APPEND_FAILED");
        assert_eq!(WalErrorCode::BjWalCorruption.code(), "BJ_WAL_CORRUPTION");
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(WalErrorCode::BjWalLogFull.severity(), Severity::Error);
        assert_eq!(WalErrorCode::BjWalInstallFailed.severity(), Severity::Error);
        assert_eq!(WalErrorCode::BjWalDeviceFailed.severity(), Severity::Fatal);
        assert_eq!(WalErrorCode::BjWalCorruption.severity(), Severity::Fatal);
    }

    #[test]
    fn test_log_full_is_not_fatal() {
        let err = WalError::log_full(300, 254);
        assert!(!err.is_fatal());
        assert_eq!(err.details(), Some("needed: 300, capacity: 254"));
    }

    #[test]
    fn test_display_includes_source() {
        let err = WalError::install_failed("write failed", DiskError::Injected(7));
        let display = err.to_string();
        assert!(display.contains("BJ_WAL_INSTALL_FAILED"));
        assert!(display.contains("block 7"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_corruption_display() {
        let err = WalError::corruption_at_block(0, "bad magic");
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("bad magic"));
        assert!(display.contains("blkno: 0"));
    }
}
