#![cfg(test)]

use std::collections::HashSet;
use std::sync::Arc;

use crate::block_device::mem_device::MemDevice;
use crate::config::{
    BAT_ENTRIES, BLOCK_SIZE, DIR_ENTRIES, FILENAME_MAX, IMAGE_SIZE, ROOT_ENTRIES, ROOT_OFF,
    SIZE_MASK,
};
use crate::layout::cell::Cell;
use crate::manager::device::ChainFs;
use crate::manager::error_code::FsError;
use crate::typ::file_type::FileType;

fn fresh_fs() -> ChainFs {
    let fs = ChainFs::new(Arc::new(MemDevice::new(IMAGE_SIZE as usize)));
    fs.mkfs();
    fs
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Blocks of the chain starting at the raw `first_block` value. Asserts
/// the chain terminates and never runs through a free cell.
fn chain_blocks(fs: &ChainFs, first_block: u32) -> Vec<u32> {
    let mut blocks = Vec::new();
    let mut cell = Cell::from_raw(first_block);
    while let Cell::Next(block) = cell {
        assert!(blocks.len() <= BAT_ENTRIES, "chain does not terminate");
        blocks.push(block);
        cell = fs.read_cell(block);
        assert_ne!(cell, Cell::Empty, "live chain runs into a free cell");
    }
    blocks
}

fn bat_snapshot(fs: &ChainFs) -> Vec<Cell> {
    (0..BAT_ENTRIES as u32).map(|b| fs.read_cell(b)).collect()
}

/// Full-tree consistency check: every live chain terminates, block
/// ownership is exclusive, every unowned cell is free, names are unique
/// per directory, and file sizes match their chain lengths exactly.
fn audit(fs: &ChainFs) {
    let mut owned: Vec<u32> = Vec::new();
    let mut stack = vec!["/".to_string()];
    while let Some(dir) = stack.pop() {
        let rows = fs.readdir(&dir).unwrap();
        let mut names = HashSet::new();
        for row in rows.iter().skip(2) {
            assert!(
                names.insert(row.name.clone()),
                "duplicate name {} in {}",
                row.name,
                dir
            );
            let child = join(&dir, &row.name);
            let (entry, _) = fs.get_entry(&child).unwrap();
            let blocks = chain_blocks(fs, entry.first_block);
            match row.kind {
                FileType::Dir => {
                    assert_eq!(blocks.len(), 2, "{} is not a two-block directory", child);
                    assert_eq!(blocks[1], blocks[0] + 1, "{} region is not contiguous", child);
                    stack.push(child);
                }
                FileType::File => {
                    let needed = (entry.file_size() as usize).div_ceil(BLOCK_SIZE);
                    assert_eq!(blocks.len(), needed, "{} chain/size mismatch", child);
                }
            }
            owned.extend(&blocks);
        }
    }
    let distinct: HashSet<u32> = owned.iter().copied().collect();
    assert_eq!(distinct.len(), owned.len(), "a block is owned twice");
    for block in 0..BAT_ENTRIES as u32 {
        if !distinct.contains(&block) {
            assert_eq!(fs.read_cell(block), Cell::Empty, "dangling block {}", block);
        }
    }
}

#[test]
fn create_then_write_then_read() {
    let fs = fresh_fs();
    fs.create("/a").unwrap();

    let meta = fs.getattr("/a").unwrap();
    assert_eq!(meta.kind, FileType::File);
    assert_eq!(meta.size, 0);

    assert_eq!(fs.write("/a", b"hello", 0).unwrap(), 5);
    assert_eq!(fs.read("/a", 10, 0).unwrap(), b"hello");
    assert_eq!(fs.getattr("/a").unwrap().size, 5);
    audit(&fs);
}

#[test]
fn directory_lifecycle() {
    let fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.create("/d/f").unwrap();

    let names: Vec<String> = fs
        .readdir("/d")
        .unwrap()
        .into_iter()
        .map(|row| row.name)
        .collect();
    assert_eq!(names, vec![".", "..", "f"]);

    assert_eq!(fs.rmdir("/d"), Err(FsError::NotEmpty));
    fs.unlink("/d/f").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(fs.getattr("/d"), Err(FsError::NotFound));
    audit(&fs);
}

#[test]
fn truncate_grow_zero_fills() {
    let fs = fresh_fs();
    fs.create("/big").unwrap();
    fs.truncate("/big", 1500).unwrap();

    let (entry, _) = fs.get_entry("/big").unwrap();
    assert_eq!(chain_blocks(&fs, entry.first_block).len(), 3);

    let data = fs.read("/big", 1500, 0).unwrap();
    assert_eq!(data.len(), 1500);
    assert!(data.iter().all(|&b| b == 0));
    audit(&fs);
}

#[test]
fn truncate_shrink_frees_tail() {
    let fs = fresh_fs();
    fs.create("/x").unwrap();
    let payload = vec![b'A'; 513];
    assert_eq!(fs.write("/x", &payload, 0).unwrap(), 513);

    fs.truncate("/x", 100).unwrap();
    let (entry, _) = fs.get_entry("/x").unwrap();
    assert_eq!(chain_blocks(&fs, entry.first_block).len(), 1);

    let data = fs.read("/x", 1000, 0).unwrap();
    assert_eq!(data, vec![b'A'; 100]);
    audit(&fs);
}

#[test]
fn resolve_through_file_fails() {
    let fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.create("/d/a").unwrap();
    assert_eq!(fs.get_entry("/d/a/b").unwrap_err(), FsError::NotADirectory);
}

#[test]
fn mkdir_without_two_free_blocks() {
    let fs = fresh_fs();
    fs.create("/fill").unwrap();
    fs.truncate("/fill", ((BAT_ENTRIES - 1) * BLOCK_SIZE) as u64)
        .unwrap();

    let before = bat_snapshot(&fs);
    assert_eq!(fs.mkdir("/two"), Err(FsError::NoSpace));
    assert_eq!(bat_snapshot(&fs), before, "failed mkdir touched the table");

    // A zero-block file still fits.
    fs.create("/one").unwrap();

    fs.truncate("/fill", ((BAT_ENTRIES - 2) * BLOCK_SIZE) as u64)
        .unwrap();
    fs.mkdir("/two").unwrap();
    assert_eq!(fs.getattr("/two").unwrap().kind, FileType::Dir);
    audit(&fs);
}

#[test]
fn read_boundaries() {
    let fs = fresh_fs();
    fs.create("/r").unwrap();
    fs.write("/r", b"0123456789", 0).unwrap();

    assert!(fs.read("/r", 4, 10).unwrap().is_empty());
    assert!(fs.read("/r", 4, 11).unwrap().is_empty());
    assert_eq!(fs.read("/r", 100, 6).unwrap(), b"6789");
    assert!(fs.read("/empty-less", 1, 0).is_err());

    fs.create("/empty").unwrap();
    assert!(fs.read("/empty", 1, 0).unwrap().is_empty());
}

#[test]
fn write_at_far_offset_zero_fills_hole() {
    let fs = fresh_fs();
    fs.create("/h").unwrap();
    assert_eq!(fs.write("/h", b"x", 1000).unwrap(), 1);
    assert_eq!(fs.getattr("/h").unwrap().size, 1001);

    let (entry, _) = fs.get_entry("/h").unwrap();
    assert_eq!(chain_blocks(&fs, entry.first_block).len(), 2);

    let data = fs.read("/h", 1001, 0).unwrap();
    assert_eq!(data.len(), 1001);
    assert!(data[..1000].iter().all(|&b| b == 0));
    assert_eq!(data[1000], b'x');
    audit(&fs);
}

#[test]
fn overwrite_keeps_size() {
    let fs = fresh_fs();
    fs.create("/o").unwrap();
    fs.write("/o", b"hello", 0).unwrap();
    assert_eq!(fs.write("/o", b"HE", 0).unwrap(), 2);
    assert_eq!(fs.read("/o", 10, 0).unwrap(), b"HEllo");
    assert_eq!(fs.getattr("/o").unwrap().size, 5);
    audit(&fs);
}

#[test]
fn truncate_is_idempotent() {
    let fs = fresh_fs();
    fs.create("/t").unwrap();
    fs.write("/t", &vec![b'z'; 2000], 0).unwrap();

    fs.truncate("/t", 700).unwrap();
    let first = bat_snapshot(&fs);
    let size = fs.getattr("/t").unwrap().size;

    fs.truncate("/t", 700).unwrap();
    assert_eq!(bat_snapshot(&fs), first);
    assert_eq!(fs.getattr("/t").unwrap().size, size);
    audit(&fs);
}

#[test]
fn truncate_to_zero_frees_chain() {
    let fs = fresh_fs();
    let baseline = bat_snapshot(&fs);

    fs.create("/z").unwrap();
    fs.write("/z", &vec![1u8; 3 * BLOCK_SIZE], 0).unwrap();
    fs.truncate("/z", 0).unwrap();

    let (entry, _) = fs.get_entry("/z").unwrap();
    assert!(entry.chain_start().is_none());
    assert_eq!(bat_snapshot(&fs), baseline);
    assert!(fs.read("/z", 10, 0).unwrap().is_empty());
    audit(&fs);
}

#[test]
fn removed_file_frees_slot_for_reuse() {
    let fs = fresh_fs();
    fs.create("/a").unwrap();
    fs.create("/b").unwrap();
    let (_, slot_a) = fs.get_entry("/a").unwrap();

    fs.unlink("/a").unwrap();
    fs.create("/c").unwrap();
    let (_, slot_c) = fs.get_entry("/c").unwrap();

    // First free slot wins, so the vacated slot is reused.
    assert_eq!(slot_c, slot_a);
    audit(&fs);
}

#[test]
fn unlink_returns_blocks() {
    let fs = fresh_fs();
    let baseline = bat_snapshot(&fs);
    fs.create("/u").unwrap();
    fs.write("/u", &vec![7u8; 2 * BLOCK_SIZE + 1], 0).unwrap();
    fs.unlink("/u").unwrap();
    assert_eq!(bat_snapshot(&fs), baseline);
    audit(&fs);
}

#[test]
fn name_length_limits() {
    let fs = fresh_fs();
    let longest = "n".repeat(FILENAME_MAX - 1);
    fs.create(&format!("/{}", longest)).unwrap();
    assert_eq!(fs.getattr(&format!("/{}", longest)).unwrap().size, 0);

    let too_long = "n".repeat(FILENAME_MAX);
    assert_eq!(
        fs.create(&format!("/{}", too_long)),
        Err(FsError::NameTooLong)
    );
    assert_eq!(
        fs.mkdir(&format!("/{}", too_long)),
        Err(FsError::NameTooLong)
    );
}

#[test]
fn error_taxonomy() {
    let fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    fs.create("/f").unwrap();

    assert_eq!(fs.create("/f"), Err(FsError::AlreadyExists));
    assert_eq!(fs.mkdir("/d"), Err(FsError::AlreadyExists));
    assert_eq!(fs.unlink("/d"), Err(FsError::IsADirectory));
    assert_eq!(fs.rmdir("/f"), Err(FsError::NotADirectory));
    assert_eq!(fs.rmdir("/"), Err(FsError::Busy));
    assert_eq!(fs.getattr("/missing"), Err(FsError::NotFound));
    assert_eq!(fs.readdir("/f").unwrap_err(), FsError::NotADirectory);
    assert_eq!(fs.read("/d", 1, 0).unwrap_err(), FsError::IsADirectory);
    assert_eq!(fs.write("/d", b"x", 0), Err(FsError::IsADirectory));
    assert_eq!(fs.truncate("/d", 0), Err(FsError::IsADirectory));
    assert_eq!(fs.create("/missing/f"), Err(FsError::NotFound));
    assert_eq!(fs.create("/f/child"), Err(FsError::NotADirectory));
    assert_eq!(fs.get_entry("relative"), Err(FsError::InvalidArgument));
}

#[test]
fn mkdir_rmdir_restores_allocation_table() {
    let fs = fresh_fs();
    fs.create("/keep").unwrap();
    fs.write("/keep", &vec![3u8; 700], 0).unwrap();

    let before = bat_snapshot(&fs);
    fs.mkdir("/d").unwrap();
    fs.rmdir("/d").unwrap();
    assert_eq!(bat_snapshot(&fs), before);
    audit(&fs);
}

#[test]
fn directory_capacity() {
    let fs = fresh_fs();
    fs.mkdir("/d").unwrap();
    for i in 0..DIR_ENTRIES {
        fs.create(&format!("/d/f{}", i)).unwrap();
    }
    assert_eq!(fs.create("/d/overflow"), Err(FsError::NoSpace));
    assert_eq!(fs.readdir("/d").unwrap().len(), DIR_ENTRIES + 2);
    audit(&fs);
}

#[test]
fn root_capacity() {
    let fs = fresh_fs();
    for i in 0..ROOT_ENTRIES {
        fs.create(&format!("/f{}", i)).unwrap();
    }
    assert_eq!(fs.create("/overflow"), Err(FsError::NoSpace));
    audit(&fs);
}

#[test]
fn size_field_limits() {
    let fs = fresh_fs();
    fs.create("/s").unwrap();
    assert_eq!(
        fs.truncate("/s", SIZE_MASK as u64 + 1),
        Err(FsError::FileTooBig)
    );
    assert_eq!(
        fs.write("/s", b"x", SIZE_MASK as u64),
        Err(FsError::FileTooBig)
    );
}

#[test]
fn short_write_when_table_fills() {
    let fs = fresh_fs();
    fs.create("/fill").unwrap();
    fs.truncate("/fill", ((BAT_ENTRIES - 2) * BLOCK_SIZE) as u64)
        .unwrap();

    fs.create("/p").unwrap();
    let payload = vec![9u8; 3 * BLOCK_SIZE];
    let written = fs.write("/p", &payload, 0).unwrap();
    assert_eq!(written, 2 * BLOCK_SIZE);
    assert_eq!(fs.getattr("/p").unwrap().size, (2 * BLOCK_SIZE) as u64);
    assert_eq!(fs.read("/p", 3 * BLOCK_SIZE, 0).unwrap(), payload[..2 * BLOCK_SIZE]);
    audit(&fs);
}

#[test]
fn failed_extension_stays_reachable() {
    let fs = fresh_fs();
    fs.create("/fill").unwrap();
    fs.truncate("/fill", ((BAT_ENTRIES - 1) * BLOCK_SIZE) as u64)
        .unwrap();

    fs.create("/q").unwrap();
    // One free block: the head is allocated, the step to the block
    // holding the offset is not.
    assert_eq!(fs.write("/q", b"x", 600), Err(FsError::NoSpace));
    let (entry, _) = fs.get_entry("/q").unwrap();
    assert_eq!(fs.getattr("/q").unwrap().size, 0);
    assert_eq!(chain_blocks(&fs, entry.first_block).len(), 1);

    // The over-long chain is still reachable, so truncating reclaims it
    // even though the size field never left zero.
    fs.truncate("/q", 0).unwrap();
    let (entry, _) = fs.get_entry("/q").unwrap();
    assert!(entry.chain_start().is_none());
    assert!(fs.find_free_block().is_some());
    audit(&fs);
}

#[test]
fn truncate_reconciles_overgrown_chain() {
    let fs = fresh_fs();
    fs.create("/fill").unwrap();
    fs.truncate("/fill", ((BAT_ENTRIES - 3) * BLOCK_SIZE) as u64)
        .unwrap();

    fs.create("/q").unwrap();
    // Three free blocks, but the write needs four to even reach its
    // offset: the chain grows by three and no byte lands.
    assert_eq!(fs.write("/q", b"x", 1536), Err(FsError::NoSpace));
    let (entry, _) = fs.get_entry("/q").unwrap();
    assert_eq!(chain_blocks(&fs, entry.first_block).len(), 3);
    assert_eq!(fs.getattr("/q").unwrap().size, 0);

    // Truncate trims against the real chain, not the stale size field.
    fs.truncate("/q", 600).unwrap();
    let (entry, _) = fs.get_entry("/q").unwrap();
    assert_eq!(chain_blocks(&fs, entry.first_block).len(), 2);
    assert_eq!(fs.read("/q", 600, 0).unwrap(), vec![0u8; 600]);
    audit(&fs);
}

#[test]
fn write_with_no_space_at_all() {
    let fs = fresh_fs();
    fs.create("/fill").unwrap();
    fs.truncate("/fill", (BAT_ENTRIES * BLOCK_SIZE) as u64)
        .unwrap();

    fs.create("/q").unwrap();
    assert_eq!(fs.write("/q", b"x", 0), Err(FsError::NoSpace));
    assert_eq!(fs.truncate("/q", 1), Err(FsError::NoSpace));
    assert_eq!(fs.getattr("/q").unwrap().size, 0);
    audit(&fs);
}

#[test]
fn cross_block_write_round_trip() {
    let fs = fresh_fs();
    fs.create("/c").unwrap();
    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(fs.write("/c", &payload, 100).unwrap(), 1000);
    assert_eq!(fs.getattr("/c").unwrap().size, 1100);
    assert_eq!(fs.read("/c", 1000, 100).unwrap(), payload);
    assert_eq!(fs.read("/c", 500, 400).unwrap(), payload[300..800]);
    audit(&fs);
}

#[test]
fn nested_directories() {
    let fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.create("/a/b/c").unwrap();
    fs.write("/a/b/c", b"deep", 0).unwrap();

    assert_eq!(fs.read("/a/b/c", 10, 0).unwrap(), b"deep");
    assert_eq!(fs.getattr("/a/b").unwrap().kind, FileType::Dir);
    assert_eq!(fs.rmdir("/a"), Err(FsError::NotEmpty));

    let names: Vec<String> = fs
        .readdir("/a/b")
        .unwrap()
        .into_iter()
        .map(|row| row.name)
        .collect();
    assert_eq!(names, vec![".", "..", "c"]);
    audit(&fs);
}

#[test]
fn root_attributes_and_offset() {
    let fs = fresh_fs();
    let meta = fs.getattr("/").unwrap();
    assert_eq!(meta.kind, FileType::Dir);
    assert_eq!(meta.nlink, 2);
    assert_eq!(meta.size, 0);

    let (entry, offset) = fs.get_entry("/").unwrap();
    assert!(entry.is_dir());
    assert_eq!(offset, ROOT_OFF);

    fs.mkdir("/d").unwrap();
    assert_eq!(fs.get_entry("/").unwrap().1, ROOT_OFF);
}

#[test]
fn readdir_lists_slot_order() {
    let fs = fresh_fs();
    fs.create("/b").unwrap();
    fs.create("/a").unwrap();
    fs.mkdir("/d").unwrap();

    let rows = fs.readdir("/").unwrap();
    let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
    // Slot order, not lexical order.
    assert_eq!(names, vec![".", "..", "b", "a", "d"]);
    assert_eq!(rows[4].kind, FileType::Dir);
}

#[test]
fn getattr_reflects_growth() {
    let fs = fresh_fs();
    fs.create("/g").unwrap();
    fs.write("/g", &vec![b'q'; 513], 0).unwrap();
    let meta = fs.getattr("/g").unwrap();
    assert_eq!(meta.kind, FileType::File);
    assert_eq!(meta.nlink, 1);
    assert_eq!(meta.size, 513);

    fs.truncate("/g", 2048).unwrap();
    assert_eq!(fs.getattr("/g").unwrap().size, 2048);
    // The grown range reads back as zeros past the original payload.
    let data = fs.read("/g", 2048, 0).unwrap();
    assert_eq!(&data[..513], &vec![b'q'; 513][..]);
    assert!(data[513..].iter().all(|&b| b == 0));
    audit(&fs);
}
