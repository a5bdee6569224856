use std::fmt;

use serde::{Serialize, Serializer};

/// Allocation role of an extent, decoded from the entry's 4-byte state tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum XdesState {
    /// Wholly unused; linked into the tablespace FREE list.
    Free,
    /// Partially used page-by-page; linked into FREE_FRAG.
    FreeFrag,
    /// Fully used page-by-page; linked into FULL_FRAG.
    FullFrag,
    /// Owned by one file segment; which of its lists holds the entry
    /// (FULL, NOT_FULL or FREE) carries the finer state.
    Fseg,
    /// Tag not modelled by this decoder, kept verbatim.
    Unknown(u32),
}

impl XdesState {
    /// Classifies a raw tag. Never fails.
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            1 => XdesState::Free,
            2 => XdesState::FreeFrag,
            3 => XdesState::FullFrag,
            4 => XdesState::Fseg,
            other => XdesState::Unknown(other),
        }
    }

    /// Raw on-disk tag.
    pub const fn tag(self) -> u32 {
        match self {
            XdesState::Free => 1,
            XdesState::FreeFrag => 2,
            XdesState::FullFrag => 3,
            XdesState::Fseg => 4,
            XdesState::Unknown(tag) => tag,
        }
    }

    /// True for extents owned by a file segment.
    pub const fn is_fseg(self) -> bool {
        matches!(self, XdesState::Fseg)
    }

    /// True when the tag was not recognised.
    pub const fn is_unknown(self) -> bool {
        matches!(self, XdesState::Unknown(_))
    }

    /// Lowercase name used in listings.
    pub const fn name(self) -> &'static str {
        match self {
            XdesState::Free => "free",
            XdesState::FreeFrag => "free_frag",
            XdesState::FullFrag => "full_frag",
            XdesState::Fseg => "fseg",
            XdesState::Unknown(_) => "unknown",
        }
    }
}

impl From<u32> for XdesState {
    fn from(tag: u32) -> Self {
        XdesState::from_tag(tag)
    }
}

impl fmt::Display for XdesState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdesState::Unknown(tag) => write!(f, "unknown({tag})"),
            known => f.write_str(known.name()),
        }
    }
}

impl Serialize for XdesState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
