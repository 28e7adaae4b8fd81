//! Error Types for Spool
//!
//! This module defines all error types that can occur while reading a disk
//! queue.
//!
//! ## Error Categories
//!
//! ### Offset Errors
//! - `MoveOffsetInvalid`: a skip or step would move a position backward or
//!   outside the valid range
//! - `OffsetInvalid`: stepping an offset forward would exceed its bound
//! - `ConfirmSizeInvalid`: a confirm points beyond the read position
//!
//! ### Data Integrity Errors
//! - `InvalidMessageSize`: a length prefix outside the configured bounds;
//!   the data file is considered corrupt from that point on
//! - `TooManyFileRolls`: a read rolled across file boundaries more times
//!   than a healthy file sequence allows
//! - `InvalidMetadata`: the reader metadata file failed the strict parse
//!
//! ### Lifecycle Errors
//! - `Exiting`: a public operation arrived after close/delete began
//!
//! ## Usage
//!
//! All fallible operations return `Result<T>`, aliased to
//! `Result<T, Error>`, so errors propagate with `?`.

use thiserror::Error;

use crate::offset::QueueOffset;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("move offset invalid")]
    MoveOffsetInvalid,

    #[error("confirm data size invalid")]
    ConfirmSizeInvalid,

    #[error("offset invalid: stepping {step} bytes from {from} exceeds {max}")]
    OffsetInvalid {
        from: QueueOffset,
        max: QueueOffset,
        step: i64,
    },

    #[error("invalid message read size ({0})")]
    InvalidMessageSize(i32),

    #[error("too many file rolls while reading at {0}")]
    TooManyFileRolls(QueueOffset),

    #[error("reader metadata corrupt: {0}")]
    InvalidMetadata(String),

    #[error("exiting")]
    Exiting,
}

impl Error {
    /// Whether this error marks the current data file as unreadable, so that
    /// corruption recovery (skip to the next file) is the right response.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::InvalidMessageSize(_) | Error::TooManyFileRolls(_)
        )
    }
}
