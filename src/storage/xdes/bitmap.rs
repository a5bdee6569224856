//! Per-page status bits of an extent.
//!
//! Each page owns [`BITS_PER_PAGE`] bits; four pages share a byte, least
//! significant bits first.

use std::iter::FusedIterator;

use serde::Serialize;

use crate::types::PageNo;

/// Pages described by one entry.
pub const PAGES_PER_EXTENT: usize = 64;

/// Status bits per page.
pub const BITS_PER_PAGE: usize = 2;

/// Page is free.
pub const BITMAP_BV_FREE: u8 = 1;

/// Page is clean. Reported, never interpreted.
pub const BITMAP_BV_CLEAN: u8 = 2;

/// Mask covering all status bits of a page.
pub const BITMAP_BV_ALL: u8 = BITMAP_BV_FREE | BITMAP_BV_CLEAN;

/// Size of the bitmap in bytes.
pub const BITMAP_SIZE: usize = PAGES_PER_EXTENT * BITS_PER_PAGE / 8;

const PAGES_PER_BYTE: usize = 8 / BITS_PER_PAGE;

/// Raw bitmap bytes of one entry.
pub type Bitmap = [u8; BITMAP_SIZE];

/// Status of a single page in an extent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PageStatus {
    /// Absolute page number.
    pub page_number: PageNo,
    /// Free bit.
    pub free: bool,
    /// Clean bit.
    pub clean: bool,
}

/// Status bits for page `index` (0-based within the extent).
///
/// Panics if `index >= PAGES_PER_EXTENT`.
pub fn status_bits(bitmap: &Bitmap, index: usize) -> u8 {
    let byte = bitmap[index / PAGES_PER_BYTE];
    let shift = (index % PAGES_PER_BYTE) * BITS_PER_PAGE;
    (byte >> shift) & BITMAP_BV_ALL
}

/// Walks every page of the extent starting at `start_page`.
///
/// Each call returns a fresh iterator over exactly [`PAGES_PER_EXTENT`] statuses.
pub fn page_statuses(bitmap: &Bitmap, start_page: PageNo) -> PageStatusIter<'_> {
    PageStatusIter {
        bitmap,
        start_page,
        next: 0,
    }
}

/// Iterator returned by [`page_statuses`].
#[derive(Clone, Debug)]
pub struct PageStatusIter<'a> {
    bitmap: &'a Bitmap,
    start_page: PageNo,
    next: usize,
}

impl Iterator for PageStatusIter<'_> {
    type Item = PageStatus;

    fn next(&mut self) -> Option<PageStatus> {
        if self.next >= PAGES_PER_EXTENT {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let bits = status_bits(self.bitmap, index);
        Some(PageStatus {
            page_number: self.start_page + index as PageNo,
            free: bits & BITMAP_BV_FREE != 0,
            clean: bits & BITMAP_BV_CLEAN != 0,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = PAGES_PER_EXTENT - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PageStatusIter<'_> {}

impl FusedIterator for PageStatusIter<'_> {}

/// Number of free pages in the bitmap.
pub fn count_free(bitmap: &Bitmap) -> usize {
    page_statuses(bitmap, 0).filter(|s| s.free).count()
}
