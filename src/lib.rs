//! Decoder for InnoDB-style extent descriptor (XDES) entries.
//!
//! An extent descriptor records which list an extent of 64 pages belongs to,
//! the role it serves, and whether each of its pages is free. Decoding is pure:
//! callers supply page bytes and receive immutable values.

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;
