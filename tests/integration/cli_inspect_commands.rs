#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;
use xdes::storage::page::fil;
use xdes::storage::{
    FilAddress, ListNode, XdesPageKind, DEFAULT_PAGE_SIZE, ENTRY_SIZE, XDES_ARRAY_OFFSET,
};

fn put_entry(
    buf: &mut [u8],
    index: usize,
    fseg_id: u64,
    list: ListNode,
    state: u32,
    bitmap: [u8; 16],
) {
    let off = XDES_ARRAY_OFFSET + index * ENTRY_SIZE;
    buf[off..off + 8].copy_from_slice(&fseg_id.to_be_bytes());
    list.encode(&mut buf[off + 8..off + 20]);
    buf[off + 20..off + 24].copy_from_slice(&state.to_be_bytes());
    buf[off + 24..off + ENTRY_SIZE].copy_from_slice(&bitmap);
}

fn setup_tablespace(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.ibd"));

    let mut page = vec![0u8; DEFAULT_PAGE_SIZE];
    page[fil::PAGE_OFFSET].copy_from_slice(&0u32.to_be_bytes());
    page[fil::PAGE_TYPE].copy_from_slice(&XdesPageKind::FspHdr.as_u16().to_be_bytes());
    let mut frag = [0xffu8; 16];
    frag[0] = 0x05;
    put_entry(&mut page, 0, 0, ListNode::default(), 2, frag);
    put_entry(
        &mut page,
        1,
        7,
        ListNode {
            prev: Some(FilAddress::new(0, 250)),
            next: None,
        },
        4,
        [0xaa; 16],
    );
    put_entry(&mut page, 2, 0, ListNode::default(), 1, [0xff; 16]);
    fs::write(&path, &page).expect("write tablespace");
    (dir, path)
}

fn json_stdout(args: &[&str], path: &Path) -> Value {
    let output = cargo_bin_cmd!("xdes-inspect")
        .args(["--format", "json"])
        .args(args)
        .arg(path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn entries_emits_json() {
    let (_dir, path) = setup_tablespace("entries");
    let json = json_stdout(&["entries"], &path);
    assert_eq!(json["page"], 0);
    let entries = json["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 256);
    assert!(json["errors"].as_array().expect("errors array").is_empty());

    assert_eq!(entries[0]["state"], "free_frag");
    assert_eq!(entries[0]["free_pages"], 62);
    assert_eq!(entries[1]["state"], "fseg");
    assert_eq!(entries[1]["fseg_id"], 7);
    assert_eq!(entries[1]["start_page"], 64);
    assert_eq!(entries[1]["end_page"], 127);
    assert_eq!(entries[1]["prev"]["offset"], 250);
    assert_eq!(entries[1]["next"], Value::Null);
    assert_eq!(entries[1]["self_address"]["offset"], 198);
    assert_eq!(entries[3]["state"], "unknown(0)");
}

#[test]
fn bitmap_lists_each_page() {
    let (_dir, path) = setup_tablespace("bitmap");
    let json = json_stdout(&["bitmap", "--extent", "0"], &path);
    let pages = json["pages"].as_array().expect("pages array");
    assert_eq!(pages.len(), 64);
    let free: Vec<bool> = pages
        .iter()
        .take(4)
        .map(|p| p["free"].as_bool().expect("bool"))
        .collect();
    assert_eq!(free, vec![true, true, false, false]);
    assert_eq!(json["bitmap"], "05ffffffffffffffffffffffffffffff");
    assert_eq!(json["free_pages"], 62);
}

#[test]
fn summary_counts_states() {
    let (_dir, path) = setup_tablespace("summary");
    let json = json_stdout(&["summary"], &path);
    assert_eq!(json["kind"], 8);
    assert_eq!(json["extents"], 256);
    assert_eq!(json["undecodable"], 0);
    assert_eq!(json["states"]["free"], 1);
    assert_eq!(json["states"]["free_frag"], 1);
    assert_eq!(json["states"]["fseg"], 1);
    assert_eq!(json["states"]["unknown"], 253);
    assert_eq!(json["free_pages"], 62 + 64);
}

#[test]
fn text_output_names_states() {
    let (_dir, path) = setup_tablespace("text");
    let output = cargo_bin_cmd!("xdes-inspect")
        .arg("entries")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("free_frag"));
    assert!(text.contains("0:250"));
}

#[test]
fn page_beyond_file_fails() {
    let (_dir, path) = setup_tablespace("range");
    cargo_bin_cmd!("xdes-inspect")
        .args(["entries", "--page", "1"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn extent_beyond_array_fails() {
    let (_dir, path) = setup_tablespace("extent");
    cargo_bin_cmd!("xdes-inspect")
        .args(["bitmap", "--extent", "256"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn unsupported_page_size_fails() {
    let (_dir, path) = setup_tablespace("size");
    cargo_bin_cmd!("xdes-inspect")
        .args(["--page-size", "4096", "entries"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn config_file_selects_json() {
    let (dir, path) = setup_tablespace("config");
    let config = dir.path().join("inspect.toml");
    fs::write(&config, "format = \"json\"\n").expect("write config");
    let output = cargo_bin_cmd!("xdes-inspect")
        .arg("--config")
        .arg(&config)
        .arg("summary")
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["extents"], 256);
}
