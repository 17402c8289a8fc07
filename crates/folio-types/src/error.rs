use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid entry id: {0}")]
    InvalidEntryId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("empty digest")]
    EmptyDigest,
}
