//! Low-level primitives for building the page decoders.

/// Byte-level cursor reads.
///
/// Fixed-width big-endian reads over page buffers, with explicit truncation errors.
pub mod bytes;
