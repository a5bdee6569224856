//! File addresses and the doubly-linked list node embedded in descriptor entries.
//!
//! The traversal that follows these links lives outside this crate; only the
//! address format and the node layout are defined here.

use std::fmt;

use serde::Serialize;

use crate::primitives::bytes::ByteCursor;
use crate::types::Result;

/// Page number marking a null address.
pub const FIL_NULL: u32 = 0xFFFF_FFFF;

/// Encoded size of a [`FilAddress`]: `page:u32` + `offset:u16`.
pub const ADDRESS_SIZE: usize = 6;

/// Encoded size of a [`ListNode`]: previous and next addresses.
pub const LIST_NODE_SIZE: usize = 2 * ADDRESS_SIZE;

/// Byte position inside a tablespace: page number plus offset within that page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct FilAddress {
    /// Page number.
    pub page: u32,
    /// Byte offset within the page.
    pub offset: u16,
}

impl FilAddress {
    /// Creates an address.
    pub const fn new(page: u32, offset: u16) -> Self {
        Self { page, offset }
    }

    /// Reads one address; a `FIL_NULL` page decodes as `None`.
    pub fn read<C: ByteCursor + ?Sized>(cursor: &mut C) -> Result<Option<Self>> {
        cursor.ensure(ADDRESS_SIZE)?;
        let page = cursor.read_u32()?;
        let offset = cursor.read_u16()?;
        if page == FIL_NULL {
            return Ok(None);
        }
        Ok(Some(Self { page, offset }))
    }

    /// Encodes `addr` into the first [`ADDRESS_SIZE`] bytes of `dst`.
    pub fn encode(addr: Option<Self>, dst: &mut [u8]) {
        let (page, offset) = match addr {
            Some(a) => (a.page, a.offset),
            None => (FIL_NULL, 0),
        };
        dst[..4].copy_from_slice(&page.to_be_bytes());
        dst[4..ADDRESS_SIZE].copy_from_slice(&offset.to_be_bytes());
    }
}

impl fmt::Display for FilAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.offset)
    }
}

/// Previous/next links of one list member.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ListNode {
    /// Previous member, `None` at the head.
    pub prev: Option<FilAddress>,
    /// Next member, `None` at the tail.
    pub next: Option<FilAddress>,
}

impl ListNode {
    /// Reads a node (prev then next).
    pub fn read<C: ByteCursor + ?Sized>(cursor: &mut C) -> Result<Self> {
        cursor.ensure(LIST_NODE_SIZE)?;
        let prev = FilAddress::read(cursor)?;
        let next = FilAddress::read(cursor)?;
        Ok(Self { prev, next })
    }

    /// Encodes the node into the first [`LIST_NODE_SIZE`] bytes of `dst`.
    pub fn encode(&self, dst: &mut [u8]) {
        FilAddress::encode(self.prev, &mut dst[..ADDRESS_SIZE]);
        FilAddress::encode(self.next, &mut dst[ADDRESS_SIZE..LIST_NODE_SIZE]);
    }

    /// True when the node is linked to neither neighbour.
    pub fn is_unlinked(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Anything that can be walked as a member of a file list.
pub trait ListLinks {
    /// Address of the previous member's list node.
    fn prev_address(&self) -> Option<FilAddress>;
    /// Address of the next member's list node.
    fn next_address(&self) -> Option<FilAddress>;
}

impl ListLinks for ListNode {
    fn prev_address(&self) -> Option<FilAddress> {
        self.prev
    }

    fn next_address(&self) -> Option<FilAddress> {
        self.next
    }
}

/// Renders an optional address, using `-` for null.
pub(crate) struct DisplayAddress(pub Option<FilAddress>);

impl fmt::Display for DisplayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{addr}"),
            None => f.write_str("-"),
        }
    }
}
