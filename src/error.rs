//! Error types for recnodb
//!
//! Provides a unified error type for all operations, plus a stable
//! error-code table for callers that need a static description.

use thiserror::Error;

/// Result type alias using RecnoError
pub type Result<T> = std::result::Result<T, RecnoError>;

/// Unified error type for recnodb operations
#[derive(Debug, Error)]
pub enum RecnoError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("System error: {0}")]
    System(#[from] std::io::Error),

    #[error("Incomplete read at offset {offset}: expected {expected} bytes, got {actual}")]
    IncompleteRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Incomplete write at offset {offset}: expected {expected} bytes, wrote {actual}")]
    IncompleteWrite {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    // -------------------------------------------------------------------------
    // Lock Errors
    // -------------------------------------------------------------------------
    #[error("Region [{offset}, +{len}) is locked by another handle")]
    LockFailed { offset: u64, len: u64 },

    #[error("Region [{offset}, +{len}) overlaps a region this handle already holds")]
    RegionAlreadyHeld { offset: u64, len: u64 },

    #[error("Failed to read locked region [{offset}, +{len})")]
    LockReadFailed { offset: u64, len: u64 },

    #[error("Failed to write back locked region [{offset}, +{len})")]
    UnlockWriteFailed { offset: u64, len: u64 },

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    #[error("Block at {parent} already links to {existing}; refusing to orphan it")]
    AttemptToOrphanBlock { parent: u64, existing: u64 },

    #[error("Block location {offset} is not a multiple of chunk size {chunk_size}")]
    InvalidBlockLocation { offset: u64, chunk_size: u32 },

    #[error("Invalid file header: {0}")]
    InvalidHeadFile(String),

    #[error("Corrupt block header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt chain: {0}")]
    CorruptChain(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Variable-length records are not supported")]
    VariableLengthUnsupported,

    #[error("Record number {0} is out of range")]
    RecnoOverflow(u64),
}

impl RecnoError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            RecnoError::System(_) => ErrorCode::SystemError,
            RecnoError::IncompleteRead { .. } => ErrorCode::IncompleteRead,
            RecnoError::IncompleteWrite { .. } => ErrorCode::IncompleteWrite,
            RecnoError::LockFailed { .. } => ErrorCode::LockFailed,
            RecnoError::RegionAlreadyHeld { .. } => ErrorCode::RegionAlreadyHeld,
            RecnoError::LockReadFailed { .. } => ErrorCode::LockReadFailed,
            RecnoError::UnlockWriteFailed { .. } => ErrorCode::UnlockWriteFailed,
            RecnoError::AttemptToOrphanBlock { .. } => ErrorCode::AttemptToOrphanBlock,
            RecnoError::InvalidBlockLocation { .. } => ErrorCode::InvalidBlockLocation,
            RecnoError::InvalidHeadFile(_) => ErrorCode::InvalidHeadFile,
            RecnoError::CorruptHeader(_) => ErrorCode::CorruptHeader,
            RecnoError::CorruptChain(_) => ErrorCode::CorruptChain,
            RecnoError::Config(_) => ErrorCode::Config,
            RecnoError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            RecnoError::VariableLengthUnsupported => ErrorCode::VariableLengthUnsupported,
            RecnoError::RecnoOverflow(_) => ErrorCode::RecnoOverflow,
        }
    }

    /// True for contention failures a caller may retry with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecnoError::LockFailed { .. })
    }

    /// The underlying OS error number, if this is a system error
    pub fn os_error(&self) -> Option<i32> {
        match self {
            RecnoError::System(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Error codes, one per `RecnoError` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SystemError,
    IncompleteRead,
    IncompleteWrite,
    LockFailed,
    RegionAlreadyHeld,
    LockReadFailed,
    UnlockWriteFailed,
    AttemptToOrphanBlock,
    InvalidBlockLocation,
    InvalidHeadFile,
    CorruptHeader,
    CorruptChain,
    Config,
    InvalidParameter,
    VariableLengthUnsupported,
    RecnoOverflow,
}

impl ErrorCode {
    /// Static, human-readable description
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::SystemError => "system error, check the OS error number",
            ErrorCode::IncompleteRead => "incomplete read",
            ErrorCode::IncompleteWrite => "incomplete write",
            ErrorCode::LockFailed => "failed to acquire lock on region",
            ErrorCode::RegionAlreadyHeld => "region overlaps a lock held by the same handle",
            ErrorCode::LockReadFailed => "failed to read locked region",
            ErrorCode::UnlockWriteFailed => "failed to write back locked region",
            ErrorCode::AttemptToOrphanBlock => "attempt to overwrite an existing block link",
            ErrorCode::InvalidBlockLocation => "block location is not chunk-aligned",
            ErrorCode::InvalidHeadFile => "file header missing or invalid",
            ErrorCode::CorruptHeader => "block header is corrupt",
            ErrorCode::CorruptChain => "block chain is corrupt",
            ErrorCode::Config => "invalid configuration",
            ErrorCode::InvalidParameter => "invalid parameter",
            ErrorCode::VariableLengthUnsupported => "variable-length records are not supported",
            ErrorCode::RecnoOverflow => "record number out of range",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
