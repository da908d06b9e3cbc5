//! Error types for tweet_tracker
//!
//! This module defines the domain-specific error types raised when an edit
//! cannot be applied, a saved blob cannot be read at all, or the state store
//! misbehaves.

use thiserror::Error;

/// Errors raised by edits and by the persistence layer.
///
/// The messages are shown directly to users and should be clear and actionable.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Unknown input set '{0}', expected 'a' or 'b'")]
    UnknownInputSet(String),

    #[error("Unknown field '{field}' for {target}")]
    UnknownField { target: &'static str, field: String },

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Calculation row {index} does not exist (table has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Trading block {index} does not exist ({len} blocks)")]
    BlockOutOfRange { index: usize, len: usize },

    #[error("Activity row {index} does not exist (block has {len} rows)")]
    ActivityOutOfRange { index: usize, len: usize },

    #[error("Price range '{0}' is not part of this block")]
    UnknownRange(String),

    #[error("Saved state is not a JSON object: {0}")]
    UnreadableState(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
