//! Read-only view over FSP_HDR and XDES pages.
//!
//! Both page types carry the FIL header, the (possibly unused) FSP header and
//! then the descriptor array, one entry per extent the page is responsible for.

use std::iter::FusedIterator;

use tracing::debug;

use crate::primitives::bytes::Cursor;
use crate::storage::list::FilAddress;
use crate::storage::xdes::{ExtentDescriptor, ExtentPage, ENTRY_SIZE, FSEG_ID_SIZE, PAGES_PER_EXTENT};
use crate::types::{Result, XdesError};

/// Byte offsets of FIL header fields.
pub mod fil {
    use core::ops::Range;

    /// Page number of this page.
    pub const PAGE_OFFSET: Range<usize> = 4..8;
    /// Page type.
    pub const PAGE_TYPE: Range<usize> = 24..26;
    /// Start of the page body.
    pub const PAGE_DATA: usize = 38;
    /// Trailing checksum/LSN bytes.
    pub const TRAILER_SIZE: usize = 8;
}

/// Size of the FSP header that precedes the descriptor array.
pub const FSP_HEADER_SIZE: usize = 112;

/// Byte offset of the first descriptor entry.
pub const XDES_ARRAY_OFFSET: usize = fil::PAGE_DATA + FSP_HEADER_SIZE;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 16384;

/// Page sizes whose extents span [`PAGES_PER_EXTENT`] pages.
pub const SUPPORTED_PAGE_SIZES: [usize; 3] = [16384, 32768, 65536];

/// Page types that carry a descriptor array.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum XdesPageKind {
    /// First page of a tablespace (and of every later page-size-sized group).
    FspHdr = 8,
    /// Descriptor-only page.
    Xdes = 9,
}

impl XdesPageKind {
    /// Type tag as stored in the FIL header.
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for XdesPageKind {
    type Error = XdesError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            8 => Ok(XdesPageKind::FspHdr),
            9 => Ok(XdesPageKind::Xdes),
            _ => Err(XdesError::Corruption("page does not hold extent descriptors")),
        }
    }
}

/// Returns true for page sizes this crate can decode.
pub fn is_supported_page_size(page_size: usize) -> bool {
    SUPPORTED_PAGE_SIZES.contains(&page_size)
}

/// A validated FSP_HDR or XDES page.
#[derive(Clone, Copy, Debug)]
pub struct XdesPage<'a> {
    buf: &'a [u8],
    page_number: u32,
    kind: XdesPageKind,
}

impl<'a> XdesPage<'a> {
    /// Wraps a full page buffer; its length is the page size.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if !is_supported_page_size(buf.len()) {
            return Err(XdesError::Invalid("unsupported page size"));
        }
        let page_number = u32::from_be_bytes(array_at(buf, fil::PAGE_OFFSET)?);
        let kind = XdesPageKind::try_from(u16::from_be_bytes(array_at(buf, fil::PAGE_TYPE)?))?;
        if page_number as usize % buf.len() != 0 {
            return Err(XdesError::Corruption(
                "descriptor page number is not a multiple of the page size",
            ));
        }
        debug!(page = page_number, kind = ?kind, page_size = buf.len(), "opened descriptor page");
        Ok(Self {
            buf,
            page_number,
            kind,
        })
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.buf.len()
    }

    /// Page type.
    pub fn kind(&self) -> XdesPageKind {
        self.kind
    }

    /// Number of entries in the descriptor array.
    pub fn entry_count(&self) -> usize {
        self.page_size() / PAGES_PER_EXTENT
    }

    /// Decodes entry `index`.
    pub fn descriptor(&self, index: usize) -> Result<ExtentDescriptor> {
        if index >= self.entry_count() {
            return Err(XdesError::Invalid("extent index beyond descriptor array"));
        }
        let mut cursor = Cursor::at(self.buf, XDES_ARRAY_OFFSET + index * ENTRY_SIZE);
        ExtentDescriptor::read(self, &mut cursor)
    }

    /// Decodes every entry in array order. Each item is decoded independently,
    /// so a failing entry does not end the walk.
    pub fn descriptors(&self) -> Descriptors<'_, 'a> {
        Descriptors {
            page: self,
            next: 0,
        }
    }

    /// Resolves a list address (which points at an entry's list node) back to
    /// the entry.
    pub fn descriptor_at(&self, addr: FilAddress) -> Result<ExtentDescriptor> {
        if addr.page != self.page_number {
            return Err(XdesError::Invalid("address refers to another page"));
        }
        let entry_offset = (addr.offset as usize)
            .checked_sub(FSEG_ID_SIZE)
            .ok_or(XdesError::Invalid("address precedes descriptor array"))?;
        let end = XDES_ARRAY_OFFSET + self.entry_count() * ENTRY_SIZE;
        if entry_offset < XDES_ARRAY_OFFSET || entry_offset >= end {
            return Err(XdesError::Invalid("address outside descriptor array"));
        }
        let mut cursor = Cursor::at(self.buf, entry_offset);
        ExtentDescriptor::read(self, &mut cursor)
    }
}

impl ExtentPage for XdesPage<'_> {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn xdes_array_offset(&self) -> usize {
        XDES_ARRAY_OFFSET
    }
}

/// Iterator returned by [`XdesPage::descriptors`].
#[derive(Clone, Debug)]
pub struct Descriptors<'p, 'a> {
    page: &'p XdesPage<'a>,
    next: usize,
}

impl Iterator for Descriptors<'_, '_> {
    type Item = Result<ExtentDescriptor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.page.entry_count() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.page.descriptor(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.page.entry_count() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Descriptors<'_, '_> {}

impl FusedIterator for Descriptors<'_, '_> {}

fn array_at<const N: usize>(buf: &[u8], range: core::ops::Range<usize>) -> Result<[u8; N]> {
    buf.get(range)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(XdesError::Corruption("page header truncated"))
}
