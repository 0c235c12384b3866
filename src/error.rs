//! Error types for compound file operations.

use thiserror::Error;

/// Main error type for container operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Header signature, byte-order mark, or geometry fields are wrong.
    /// Fatal: open aborts immediately.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Chain cycle, out-of-range sector index, or chain length disagreeing
    /// with a declared stream length. A broken allocation table is a
    /// file-wide anomaly, so this is fatal for the whole container.
    #[error("corrupt sector chain: {0}")]
    CorruptChain(String),

    /// Requested stream path is absent. Recoverable.
    #[error("stream not found: {0}")]
    MissingStream(String),

    /// Write-path validation failure (name too long, duplicate sibling
    /// names, unrepresentable sector count). Raised before any byte is
    /// emitted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Underlying read/write failure, propagated without retry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;
