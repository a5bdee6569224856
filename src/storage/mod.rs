//! Allocation bookkeeping structures of a tablespace.
//!
//! Decodes the extent descriptor entries stored in FSP_HDR and XDES pages and
//! the list links that chain them together.

/// File addresses and list nodes.
///
/// The address format shared by every file-based linked list.
pub mod list;

/// FSP_HDR / XDES page view.
///
/// Locates the descriptor array inside a page and decodes its entries.
pub mod page;

/// Extent descriptor entries.
pub mod xdes;

pub use list::{FilAddress, ListLinks, ListNode, FIL_NULL};
pub use page::{XdesPage, XdesPageKind, DEFAULT_PAGE_SIZE, XDES_ARRAY_OFFSET};
pub use xdes::{ExtentDescriptor, ExtentPage, PageStatus, XdesState, ENTRY_SIZE, PAGES_PER_EXTENT};
