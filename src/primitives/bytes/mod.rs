#![forbid(unsafe_code)]
//! Big-endian cursor reads shared by the page decoders.

use core::convert::TryInto;
use core::fmt;

use crate::types::{Result, XdesError};

/// Positioned reader over page bytes.
///
/// Positions are byte offsets within the enclosing page. Every read either
/// consumes exactly the requested width or fails with
/// [`XdesError::TruncatedInput`] without moving the cursor.
pub trait ByteCursor {
    /// Current byte offset.
    fn position(&self) -> usize;

    /// Number of bytes left between the current offset and the end of input.
    fn remaining(&self) -> usize;

    /// Reads `len` raw bytes, advancing past them.
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]>;

    /// Reads a big-endian `u16`.
    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes(to_array(bytes)?))
    }

    /// Reads a big-endian `u32`.
    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes(to_array(bytes)?))
    }

    /// Reads a big-endian `u64`.
    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_be_bytes(to_array(bytes)?))
    }

    /// Fails unless at least `needed` bytes remain.
    fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(XdesError::TruncatedInput {
                offset: self.position(),
                needed,
                available,
            });
        }
        Ok(())
    }
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| XdesError::Corruption("cursor returned a short read"))
}

/// A cursor for reading bytes from a slice with offset tracking.
#[derive(Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a new cursor starting at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    /// Creates a cursor positioned at `off`.
    pub fn at(buf: &'a [u8], off: usize) -> Self {
        Self { buf, off }
    }

    /// Moves the cursor to `off`.
    pub fn seek(&mut self, off: usize) {
        self.off = off;
    }

    /// Takes the next `n` bytes, keeping the borrow tied to the buffer.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let end = self.off + n;
        let slice = self.buf.get(self.off..end).unwrap_or(&[]);
        self.off = end;
        Ok(slice)
    }
}

impl ByteCursor for Cursor<'_> {
    fn position(&self) -> usize {
        self.off
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.off)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        self.take(len)
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("off", &self.off)
            .field("remaining", &self.remaining())
            .finish()
    }
}
