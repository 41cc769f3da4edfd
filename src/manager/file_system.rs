use std::cmp::{max, min};

use log::debug;

use crate::config::{BLOCKIDX_END, BLOCK_SIZE, DIR_ENTRIES, ENTRY_SIZE, SIZE_MASK};
use crate::layout::cell::Cell;
use crate::layout::entry::DirEntry;
use crate::manager::device::ChainFs;
use crate::manager::error_code::{FsError, FsResult};
use crate::manager::path::split_parent;
use crate::manager::{DirEntryDetail, Metadata};
use crate::typ::file_name::FileName;
use crate::typ::file_type::FileType;

/// The operation surface handed to the FUSE layer. Every operation
/// resolves its path first; a failed resolve never mutates the disk.
impl ChainFs {
    /// Attribute lookup. Nothing beyond kind, size and link count is
    /// persisted, so ownership and timestamps are the caller's to fill.
    pub fn getattr(&self, path: &str) -> FsResult<Metadata> {
        let (entry, _) = self.get_entry(path)?;
        Ok(if entry.is_dir() {
            Metadata {
                kind: FileType::Dir,
                size: 0,
                nlink: 2,
            }
        } else {
            Metadata {
                kind: FileType::File,
                size: entry.file_size() as u64,
                nlink: 1,
            }
        })
    }

    /// Directory listing: `.` and `..` first, then every occupied slot in
    /// on-disk order.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<DirEntryDetail>> {
        let (entry, _) = self.get_entry(path)?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let region = self.dir_region(path, &entry);
        let mut rows = vec![
            DirEntryDetail {
                name: ".".into(),
                kind: FileType::Dir,
                size: 0,
            },
            DirEntryDetail {
                name: "..".into(),
                kind: FileType::Dir,
                size: 0,
            },
        ];
        for slot in 0..region.capacity {
            let slot_entry = self.read_entry(region.slot_off(slot));
            if !slot_entry.is_free() {
                rows.push(DirEntryDetail {
                    name: slot_entry.name.to_string(),
                    kind: slot_entry.kind(),
                    size: slot_entry.file_size() as u64,
                });
            }
        }
        Ok(rows)
    }

    /// Reads up to `size` bytes at `offset`, clamped to the file size.
    /// A chain that terminates early just ends the copy, so the returned
    /// buffer may be shorter than the clamped request.
    pub fn read(&self, path: &str, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        let (entry, _) = self.get_entry(path)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        let file_size = entry.file_size() as u64;
        if offset >= file_size {
            return Ok(Vec::new());
        }
        let size = min(size as u64, file_size - offset) as usize;
        let Some(mut block) = entry.chain_start() else {
            return Ok(Vec::new());
        };

        // Skip whole blocks in front of the requested span.
        let mut skip = offset;
        while skip >= BLOCK_SIZE as u64 {
            match self.read_cell(block) {
                Cell::Next(next) => block = next,
                _ => return Ok(Vec::new()),
            }
            skip -= BLOCK_SIZE as u64;
        }

        let mut buf = vec![0u8; size];
        let mut in_block = skip as usize;
        let mut read = 0usize;
        loop {
            let can_read = min(BLOCK_SIZE - in_block, size - read);
            self.read_data(block, in_block, &mut buf[read..read + can_read]);
            read += can_read;
            in_block = 0;
            if read == size {
                break;
            }
            match self.read_cell(block) {
                Cell::Next(next) => block = next,
                _ => break,
            }
        }
        buf.truncate(read);
        Ok(buf)
    }

    /// Writes `data` at `offset`, growing the chain as needed. Every
    /// block this path allocates is zero-filled before it is linked, so a
    /// hole left by a far offset reads back as zeros. Returns the bytes
    /// written; allocation failure after the first byte yields a short
    /// count rather than an error.
    pub fn write(&self, path: &str, data: &[u8], offset: u64) -> FsResult<usize> {
        let (mut entry, slot_off) = self.get_entry(path)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        if offset + data.len() as u64 > SIZE_MASK as u64 {
            return Err(FsError::FileTooBig);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let old_size = entry.file_size();
        let mut entry_dirty = false;

        // An empty file gets its head block up front.
        let mut block = match entry.chain_start() {
            Some(first) => first,
            None => {
                let Some(first) = self.alloc_linked(None) else {
                    return Err(FsError::NoSpace);
                };
                entry.first_block = first;
                entry_dirty = true;
                first
            }
        };

        // Walk (or build) the chain out to the block holding `offset`.
        let mut block_start = 0u64;
        let mut reached = true;
        while block_start + BLOCK_SIZE as u64 <= offset {
            let next = match self.read_cell(block) {
                Cell::Next(next) => Some(next),
                _ => self.alloc_linked(Some(block)),
            };
            match next {
                Some(next) => block = next,
                None => {
                    reached = false;
                    break;
                }
            }
            block_start += BLOCK_SIZE as u64;
        }
        if !reached {
            // Nothing of `data` landed; keep the grown chain reachable.
            if entry_dirty {
                self.write_entry(slot_off, &entry);
            }
            return Err(FsError::NoSpace);
        }

        let mut written = 0usize;
        loop {
            let in_block = (offset + written as u64 - block_start) as usize;
            let can_write = min(BLOCK_SIZE - in_block, data.len() - written);
            self.write_data(block, in_block, &data[written..written + can_write]);
            written += can_write;
            if written == data.len() {
                break;
            }
            let next = match self.read_cell(block) {
                Cell::Next(next) => Some(next),
                _ => self.alloc_linked(Some(block)),
            };
            match next {
                Some(next) => block = next,
                None => break,
            }
            block_start += BLOCK_SIZE as u64;
        }

        let new_size = max(old_size as u64, offset + written as u64) as u32;
        if entry_dirty || new_size != old_size {
            entry.size = new_size;
            self.write_entry(slot_off, &entry);
        }
        if written < data.len() {
            debug!("short write on {}: {} of {} bytes", path, written, data.len());
        }
        Ok(written)
    }

    /// Grows or shrinks the file to exactly `size` bytes. Appended blocks
    /// are zero-filled; a shrink frees the tail chain and re-plants the
    /// terminator. Idempotent at the current size.
    pub fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        if size > SIZE_MASK as u64 {
            return Err(FsError::FileTooBig);
        }
        let (mut entry, slot_off) = self.get_entry(path)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        self.resize_chain(&mut entry, slot_off, size)?;
        entry.size = size as u32;
        self.write_entry(slot_off, &entry);
        Ok(())
    }

    /// Makes the chain exactly `ceil(size / BLOCK_SIZE)` blocks long,
    /// appending zero-filled blocks or cutting the tail as needed. The
    /// decision reconciles against the chain itself, not the size field:
    /// a write that died mid-extension leaves more blocks than the size
    /// records, and those must come back here.
    fn resize_chain(&self, entry: &mut DirEntry, slot_off: u64, size: u64) -> FsResult<()> {
        let blocks_needed = (size as usize).div_ceil(BLOCK_SIZE);
        if blocks_needed == 0 {
            if let Some(first) = entry.chain_start() {
                self.free_block_chain(first);
            }
            entry.first_block = BLOCKIDX_END;
            return Ok(());
        }

        let mut tail = match entry.chain_start() {
            Some(first) => first,
            None => {
                let Some(first) = self.alloc_linked(None) else {
                    return Err(FsError::NoSpace);
                };
                entry.first_block = first;
                // Persist the new head before appending: a failure below
                // must not leave the chain unreachable.
                self.write_entry(slot_off, entry);
                first
            }
        };

        // Walk up to the wanted length, counting what is already there.
        let mut have = 1;
        while have < blocks_needed {
            match self.read_cell(tail) {
                Cell::Next(next) => {
                    tail = next;
                    have += 1;
                }
                _ => break,
            }
        }

        if have < blocks_needed {
            for _ in have..blocks_needed {
                let Some(next) = self.alloc_linked(Some(tail)) else {
                    return Err(FsError::NoSpace);
                };
                tail = next;
            }
        } else {
            // Long enough: cut whatever hangs past the new tail.
            let suffix = self.read_cell(tail);
            self.write_cell(tail, Cell::End);
            if let Cell::Next(suffix) = suffix {
                self.free_block_chain(suffix);
            }
        }
        Ok(())
    }

    /// Creates an empty regular file: no blocks, size zero.
    pub fn create(&self, path: &str) -> FsResult<()> {
        let (parent_path, leaf) = split_parent(path)?;
        let name = FileName::new(leaf)?;
        if self.get_entry(path).is_ok() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self.parent_slot(parent_path)?;
        self.write_entry(slot, &DirEntry::new_file(name));
        Ok(())
    }

    /// Removes a regular file: frees its chain, clears its slot.
    pub fn unlink(&self, path: &str) -> FsResult<()> {
        let (entry, slot_off) = self.get_entry(path)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        if let Some(first) = entry.chain_start() {
            self.free_block_chain(first);
        }
        self.write_entry(slot_off, &DirEntry::free());
        Ok(())
    }

    /// Creates a subdirectory: a two-block span holding a fresh slot
    /// array. Block reservation is all-or-nothing, so a failed mkdir
    /// leaves the allocation table untouched.
    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        let (parent_path, leaf) = split_parent(path)?;
        let name = FileName::new(leaf)?;
        if self.get_entry(path).is_ok() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self.parent_slot(parent_path)?;
        let (head, tail) = self.find_free_pair().ok_or(FsError::NoSpace)?;

        // Terminator first, then the link, then the slot array, and the
        // parent slot only once the region is fully formed.
        self.write_cell(tail, Cell::End);
        self.write_cell(head, Cell::Next(tail));
        let free = DirEntry::free();
        for slot_idx in 0..DIR_ENTRIES {
            self.write_entry(
                Self::block_off(head) + (slot_idx * ENTRY_SIZE) as u64,
                &free,
            );
        }
        self.write_entry(slot, &DirEntry::new_dir(name, head));
        Ok(())
    }

    /// Removes an empty directory. The root is never removable.
    pub fn rmdir(&self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::Busy);
        }
        let (entry, slot_off) = self.get_entry(path)?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let region = self.dir_region(path, &entry);
        if !self.dir_is_empty(region) {
            return Err(FsError::NotEmpty);
        }
        self.free_block_chain(entry.first_block);
        self.write_entry(slot_off, &DirEntry::free());
        Ok(())
    }

    /// Free slot in the directory at `parent_path`.
    fn parent_slot(&self, parent_path: &str) -> FsResult<u64> {
        let (parent, _) = self.get_entry(parent_path)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let region = self.dir_region(parent_path, &parent);
        self.find_free_slot(region)
    }
}
