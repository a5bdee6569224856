#![forbid(unsafe_code)]
//! Shared identifiers and the crate-wide error type.

/// Absolute page number within a tablespace.
///
/// On-disk page references are 32 bits wide; derived page numbers (such as the
/// last page of an extent) are widened so the arithmetic never wraps.
pub type PageNo = u64;

/// Errors surfaced while decoding extent descriptor data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum XdesError {
    /// Fewer bytes remain than the read requires.
    #[error("truncated input: need {needed} bytes at offset {offset}, {available} available")]
    TruncatedInput {
        /// Cursor position at which the read was attempted.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// The cursor does not sit on an entry boundary of the descriptor array.
    #[error("misaligned record: position {position} is not an entry boundary (array starts at {array_start})")]
    MisalignedRecord {
        /// Cursor position handed to the decoder.
        position: usize,
        /// Byte offset of the first entry of the array.
        array_start: usize,
    },
    /// Page-level structure does not match the expected layout.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller passed an argument outside the accepted range.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XdesError>;
