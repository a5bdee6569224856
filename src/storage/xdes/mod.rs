//! Extent descriptor (XDES) entries.
//!
//! An entry is a fixed 40-byte record describing one extent of
//! [`PAGES_PER_EXTENT`] pages: the owning segment, the list the extent is
//! linked into, its allocation state, and a two-bit status per page. Entries
//! are laid out back to back in an array inside FSP_HDR and XDES pages, so the
//! extent an entry describes follows from its position in that array.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use tracing::{debug, trace};

use crate::primitives::bytes::ByteCursor;
use crate::storage::list::{DisplayAddress, FilAddress, ListLinks, ListNode, LIST_NODE_SIZE};
use crate::types::{PageNo, Result, XdesError};

mod bitmap;
mod state;

pub use bitmap::{
    count_free, page_statuses, status_bits, Bitmap, PageStatus, PageStatusIter, BITMAP_BV_ALL,
    BITMAP_BV_CLEAN, BITMAP_BV_FREE, BITMAP_SIZE, BITS_PER_PAGE, PAGES_PER_EXTENT,
};
pub use state::XdesState;

/// Width of the owning segment id.
pub const FSEG_ID_SIZE: usize = 8;

/// Width of the state tag.
pub const STATE_SIZE: usize = 4;

/// How a field's bytes are interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// Big-endian `u64`.
    U64,
    /// Big-endian `u32`.
    U32,
    /// Previous/next file addresses.
    ListNode,
    /// Uninterpreted bytes.
    Bytes,
}

/// One field of the on-disk entry layout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    /// Field name, as shown in diagnostics.
    pub name: &'static str,
    /// Encoded width in bytes.
    pub width: usize,
    /// Decoding applied to the bytes.
    pub kind: FieldKind,
}

/// Entry layout, in on-disk order.
pub const ENTRY_FIELDS: [Field; 4] = [
    Field {
        name: "fseg_id",
        width: FSEG_ID_SIZE,
        kind: FieldKind::U64,
    },
    Field {
        name: "list",
        width: LIST_NODE_SIZE,
        kind: FieldKind::ListNode,
    },
    Field {
        name: "state",
        width: STATE_SIZE,
        kind: FieldKind::U32,
    },
    Field {
        name: "bitmap",
        width: BITMAP_SIZE,
        kind: FieldKind::Bytes,
    },
];

/// Size of one entry in bytes.
pub const ENTRY_SIZE: usize = layout_size(&ENTRY_FIELDS);

const fn layout_size(fields: &[Field]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].width;
        i += 1;
    }
    total
}

/// Byte offset of `name` within an entry, if the layout has such a field.
pub fn field_offset(name: &str) -> Option<usize> {
    let mut offset = 0;
    for field in &ENTRY_FIELDS {
        if field.name == name {
            return Some(offset);
        }
        offset += field.width;
    }
    None
}

/// The page holding a descriptor array.
pub trait ExtentPage {
    /// Number of the page itself; the first extent it describes starts here.
    fn page_number(&self) -> u32;

    /// Byte offset within the page of the first array entry.
    fn xdes_array_offset(&self) -> usize;
}

#[derive(Clone, Copy, Debug)]
enum FieldValue<'a> {
    Int(u64),
    Node(ListNode),
    Bytes(&'a [u8]),
}

fn read_field<'c, C: ByteCursor + ?Sized>(
    cursor: &'c mut C,
    field: &Field,
) -> Result<FieldValue<'c>> {
    let start = cursor.position();
    let value = match field.kind {
        FieldKind::U64 => FieldValue::Int(cursor.read_u64()?),
        FieldKind::U32 => FieldValue::Int(u64::from(cursor.read_u32()?)),
        FieldKind::ListNode => FieldValue::Node(ListNode::read(cursor)?),
        FieldKind::Bytes => {
            let bytes = cursor.read_bytes(field.width)?;
            if bytes.len() != field.width {
                return Err(XdesError::Corruption("entry field width disagrees with layout"));
            }
            return Ok(FieldValue::Bytes(bytes));
        }
    };
    if cursor.position() - start != field.width {
        return Err(XdesError::Corruption("entry field width disagrees with layout"));
    }
    Ok(value)
}

/// A decoded extent descriptor entry.
///
/// Built eagerly from the page bytes and never modified afterwards. Two
/// descriptors compare equal when they sit at the same address.
#[derive(Clone, Debug, Serialize)]
pub struct ExtentDescriptor {
    offset: usize,
    start_page: PageNo,
    fseg_id: u64,
    #[serde(rename = "self_address")]
    this: FilAddress,
    list: ListNode,
    state: XdesState,
    #[serde(serialize_with = "serialize_bitmap")]
    bitmap: Bitmap,
}

fn serialize_bitmap<S: serde::Serializer>(
    bitmap: &Bitmap,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bitmap))
}

impl ExtentDescriptor {
    /// Decodes the entry under `cursor`, which must sit on an entry boundary of
    /// `page`'s descriptor array.
    ///
    /// On success the cursor has advanced by exactly [`ENTRY_SIZE`]. On failure it
    /// has not moved.
    pub fn read<P, C>(page: &P, cursor: &mut C) -> Result<Self>
    where
        P: ExtentPage + ?Sized,
        C: ByteCursor + ?Sized,
    {
        let offset = cursor.position();
        let index = extent_index(offset, page.xdes_array_offset())?;
        cursor.ensure(ENTRY_SIZE)?;

        let start_page =
            PageNo::from(page.page_number()) + (index * PAGES_PER_EXTENT) as PageNo;
        let this = FilAddress::new(page.page_number(), list_node_offset(offset)?);

        let mut fseg_id = 0;
        let mut list = ListNode::default();
        let mut state = XdesState::Unknown(0);
        let mut bitmap = [0u8; BITMAP_SIZE];
        for field in &ENTRY_FIELDS {
            match (field.kind, read_field(cursor, field)?) {
                (FieldKind::U64, FieldValue::Int(v)) => fseg_id = v,
                (FieldKind::U32, FieldValue::Int(v)) => state = XdesState::from_tag(v as u32),
                (FieldKind::ListNode, FieldValue::Node(node)) => list = node,
                (FieldKind::Bytes, FieldValue::Bytes(bytes)) => bitmap.copy_from_slice(bytes),
                _ => return Err(XdesError::Corruption("entry field decoded as wrong kind")),
            }
        }

        if state.is_unknown() {
            debug!(
                page = page.page_number(),
                offset,
                tag = state.tag(),
                "extent descriptor carries unknown state tag"
            );
        }
        trace!(
            page = page.page_number(),
            index,
            start_page,
            state = %state,
            "decoded extent descriptor"
        );

        Ok(Self {
            offset,
            start_page,
            fseg_id,
            this,
            list,
            state,
            bitmap,
        })
    }

    /// Byte offset of the entry within its page.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Position of the entry within its page's descriptor array.
    pub fn extent_index(&self) -> usize {
        ((self.start_page - PageNo::from(self.this.page)) / PAGES_PER_EXTENT as PageNo) as usize
    }

    /// First page of the extent.
    pub fn start_page(&self) -> PageNo {
        self.start_page
    }

    /// Last page of the extent.
    pub fn end_page(&self) -> PageNo {
        self.start_page + (PAGES_PER_EXTENT - 1) as PageNo
    }

    /// Owning file segment. Meaningful only for [`XdesState::Fseg`].
    pub fn fseg_id(&self) -> u64 {
        self.fseg_id
    }

    /// Address of this entry's list node, as referenced by its neighbours.
    pub fn self_address(&self) -> FilAddress {
        self.this
    }

    /// List linkage of this entry.
    pub fn list_node(&self) -> &ListNode {
        &self.list
    }

    /// Allocation state.
    pub fn state(&self) -> XdesState {
        self.state
    }

    /// Raw status bitmap.
    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// True when the extent belongs to segment `fseg_id`.
    pub fn allocated_to_fseg(&self, fseg_id: u64) -> bool {
        self.state.is_fseg() && self.fseg_id == fseg_id
    }

    /// Status of every page in the extent, in page order.
    pub fn page_statuses(&self) -> PageStatusIter<'_> {
        page_statuses(&self.bitmap, self.start_page)
    }

    /// Status of `page_number`, or `None` when the page lies outside the extent.
    pub fn page_status(&self, page_number: PageNo) -> Option<PageStatus> {
        if page_number < self.start_page || page_number > self.end_page() {
            return None;
        }
        let index = (page_number - self.start_page) as usize;
        self.page_statuses().nth(index)
    }

    /// Pages whose free bit is set.
    pub fn free_pages(&self) -> usize {
        count_free(&self.bitmap)
    }

    /// Pages whose free bit is clear.
    pub fn used_pages(&self) -> usize {
        PAGES_PER_EXTENT - self.free_pages()
    }
}

impl ListLinks for ExtentDescriptor {
    fn prev_address(&self) -> Option<FilAddress> {
        self.list.prev
    }

    fn next_address(&self) -> Option<FilAddress> {
        self.list.next
    }
}

impl PartialEq for ExtentDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.this == other.this
    }
}

impl Eq for ExtentDescriptor {}

impl Hash for ExtentDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.this.hash(state);
    }
}

impl fmt::Display for ExtentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "xdes {} pages {}-{} state={} fseg={} prev={} next={} free={} used={}",
            self.this,
            self.start_page,
            self.end_page(),
            self.state,
            self.fseg_id,
            DisplayAddress(self.list.prev),
            DisplayAddress(self.list.next),
            self.free_pages(),
            self.used_pages(),
        )
    }
}

/// Index of the entry starting at `position` in an array beginning at `array_start`.
pub fn extent_index(position: usize, array_start: usize) -> Result<usize> {
    match position.checked_sub(array_start) {
        Some(delta) if delta % ENTRY_SIZE == 0 => Ok(delta / ENTRY_SIZE),
        _ => Err(XdesError::MisalignedRecord {
            position,
            array_start,
        }),
    }
}

fn list_node_offset(entry_offset: usize) -> Result<u16> {
    let offset = entry_offset + FSEG_ID_SIZE;
    u16::try_from(offset).map_err(|_| XdesError::Invalid("entry offset beyond page address range"))
}
