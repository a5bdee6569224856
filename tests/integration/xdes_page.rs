#![allow(missing_docs)]

use std::fs;
use std::io::{Read, Seek, SeekFrom};

use tempfile::TempDir;
use xdes::storage::page::fil;
use xdes::storage::{
    ExtentDescriptor, FilAddress, ListLinks, ListNode, XdesPage, XdesPageKind, XdesState,
    DEFAULT_PAGE_SIZE, ENTRY_SIZE, PAGES_PER_EXTENT, XDES_ARRAY_OFFSET,
};
use xdes::types::XdesError;

fn node_addr(page: u32, index: usize) -> FilAddress {
    FilAddress::new(page, (XDES_ARRAY_OFFSET + index * ENTRY_SIZE + 8) as u16)
}

fn write_entry(
    buf: &mut [u8],
    index: usize,
    fseg_id: u64,
    list: ListNode,
    state: u32,
    bitmap: [u8; 16],
) {
    let off = XDES_ARRAY_OFFSET + index * ENTRY_SIZE;
    let entry = &mut buf[off..off + ENTRY_SIZE];
    entry[..8].copy_from_slice(&fseg_id.to_be_bytes());
    list.encode(&mut entry[8..20]);
    entry[20..24].copy_from_slice(&state.to_be_bytes());
    entry[24..].copy_from_slice(&bitmap);
}

/// First page of a small tablespace: the system extents in use, a free
/// fragment extent, and a two-extent segment chained through its list node.
fn fsp_hdr_page() -> Vec<u8> {
    let mut buf = vec![0u8; DEFAULT_PAGE_SIZE];
    buf[fil::PAGE_OFFSET].copy_from_slice(&0u32.to_be_bytes());
    buf[fil::PAGE_TYPE].copy_from_slice(&XdesPageKind::FspHdr.as_u16().to_be_bytes());

    let mut frag = [0xffu8; 16];
    frag[0] = 0xa8; // pages 0..4: free, used, used, used
    write_entry(&mut buf, 0, 0, ListNode::default(), 2, frag);
    write_entry(&mut buf, 1, 0, ListNode::default(), 1, [0xff; 16]);
    write_entry(
        &mut buf,
        2,
        42,
        ListNode {
            prev: None,
            next: Some(node_addr(0, 3)),
        },
        4,
        [0xaa; 16],
    );
    write_entry(
        &mut buf,
        3,
        42,
        ListNode {
            prev: Some(node_addr(0, 2)),
            next: None,
        },
        4,
        [0x55; 16],
    );
    write_entry(&mut buf, 4, 0, ListNode::default(), 3, [0x00; 16]);
    buf
}

#[test]
fn classifies_every_entry_of_an_fsp_hdr_page() -> xdes::types::Result<()> {
    let buf = fsp_hdr_page();
    let page = XdesPage::new(&buf)?;
    assert_eq!(page.kind(), XdesPageKind::FspHdr);
    assert_eq!(page.entry_count(), DEFAULT_PAGE_SIZE / PAGES_PER_EXTENT);

    let entries: Vec<ExtentDescriptor> = page.descriptors().collect::<Result<_, _>>()?;
    let states: Vec<XdesState> = entries.iter().take(6).map(|e| e.state()).collect();
    assert_eq!(
        states,
        vec![
            XdesState::FreeFrag,
            XdesState::Free,
            XdesState::Fseg,
            XdesState::Fseg,
            XdesState::FullFrag,
            XdesState::Unknown(0),
        ]
    );
    for (k, entry) in entries.iter().enumerate() {
        assert_eq!(entry.start_page(), (k * PAGES_PER_EXTENT) as u64);
        assert_eq!(entry.self_address(), node_addr(0, k));
    }
    Ok(())
}

#[test]
fn walks_a_segment_list_through_addresses() -> xdes::types::Result<()> {
    let buf = fsp_hdr_page();
    let page = XdesPage::new(&buf)?;

    let mut members = Vec::new();
    let mut cursor = Some(node_addr(0, 2));
    while let Some(addr) = cursor {
        let entry = page.descriptor_at(addr)?;
        assert!(entry.allocated_to_fseg(42));
        cursor = entry.next_address();
        members.push(entry.start_page());
    }
    assert_eq!(members, vec![128, 192]);

    let tail = page.descriptor(3)?;
    let head = page.descriptor_at(tail.prev_address().expect("tail has prev"))?;
    assert_eq!(head, page.descriptor(2)?);
    assert_eq!(head.prev_address(), None);
    Ok(())
}

#[test]
fn bitmap_reports_page_level_status() -> xdes::types::Result<()> {
    let buf = fsp_hdr_page();
    let page = XdesPage::new(&buf)?;

    let frag = page.descriptor(0)?;
    let first: Vec<(u64, bool, bool)> = frag
        .page_statuses()
        .take(4)
        .map(|s| (s.page_number, s.free, s.clean))
        .collect();
    assert_eq!(
        first,
        vec![(0, false, false), (1, false, true), (2, false, true), (3, false, true)]
    );
    assert_eq!(frag.free_pages(), 60);
    assert_eq!(frag.used_pages(), 4);

    let tail = page.descriptor(3)?;
    assert!(tail.page_statuses().all(|s| s.free && !s.clean));
    assert_eq!(tail.page_status(200).map(|s| s.free), Some(true));
    assert_eq!(tail.page_status(256), None);

    let full = page.descriptor(4)?;
    assert_eq!(full.free_pages(), 0);
    Ok(())
}

#[test]
fn decodes_page_read_back_from_a_tablespace_file() -> xdes::types::Result<()> {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("t1.ibd");
    let mut contents = fsp_hdr_page();
    contents.extend(std::iter::repeat(0u8).take(DEFAULT_PAGE_SIZE));
    fs::write(&path, &contents).expect("write tablespace");

    let mut file = fs::File::open(&path).expect("open tablespace");
    file.seek(SeekFrom::Start(0)).expect("seek");
    let mut buf = vec![0u8; DEFAULT_PAGE_SIZE];
    file.read_exact(&mut buf).expect("read page");

    let page = XdesPage::new(&buf)?;
    assert_eq!(page.descriptor(1)?.state(), XdesState::Free);

    file.read_exact(&mut buf).expect("read second page");
    assert!(matches!(XdesPage::new(&buf), Err(XdesError::Corruption(_))));
    Ok(())
}

#[test]
fn damaged_entries_do_not_stop_the_walk() -> xdes::types::Result<()> {
    let mut buf = fsp_hdr_page();
    write_entry(&mut buf, 7, 0, ListNode::default(), 0xdead_beef, [0x0f; 16]);
    let page = XdesPage::new(&buf)?;

    let decoded: Vec<_> = page.descriptors().collect();
    assert_eq!(decoded.len(), page.entry_count());
    let odd = decoded[7].as_ref().expect("unknown tag is still decodable");
    assert_eq!(odd.state(), XdesState::Unknown(0xdead_beef));
    assert_eq!(odd.state().to_string(), "unknown(3735928559)");
    assert_eq!(odd.free_pages(), 32);

    assert!(matches!(
        page.descriptor_at(FilAddress::new(0, node_addr(0, 7).offset + 1)),
        Err(XdesError::MisalignedRecord { .. })
    ));
    Ok(())
}
