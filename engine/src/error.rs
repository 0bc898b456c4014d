//! Error types for the quotesync engine.

use thiserror::Error;

/// All possible errors from the quotesync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Validation errors
    #[error("invalid quote: {0}")]
    InvalidQuote(String),

    #[error("duplicate quote key: {0}")]
    DuplicateKey(String),

    #[error("invalid import: {0}")]
    InvalidImport(String),

    // State errors
    #[error("no backup available to revert to")]
    NoBackupAvailable,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
