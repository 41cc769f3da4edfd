use std::sync::Arc;

use crate::block_device::block_device::BlockDevice;
use crate::config::{
    BAT_ENTRIES, BAT_OFF, BLOCK_SIZE, CELL_SIZE, DATA_OFF, ENTRY_SIZE, ROOT_ENTRIES, ROOT_OFF,
};
use crate::layout::cell::Cell;
use crate::layout::entry::DirEntry;

/// Filesystem handle over a byte-addressed image device.
///
/// All state lives on the device; the handle only carries the device
/// reference. Operations are not serialized beyond the device's own
/// locking, so one caller at a time owns the handle (the fuser session
/// loop already runs callbacks sequentially).
pub struct ChainFs {
    device: Arc<dyn BlockDevice>,
}

impl ChainFs {
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self { device }
    }

    /// Formats the image: every root slot free, every table cell empty.
    /// The data region is left alone; blocks are zeroed when linked.
    pub fn mkfs(&self) {
        let mut root = vec![0u8; ROOT_ENTRIES * ENTRY_SIZE];
        let free = DirEntry::free().to_bytes();
        for slot in 0..ROOT_ENTRIES {
            root[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE].copy_from_slice(&free);
        }
        self.device.write_at(&root, ROOT_OFF);

        let mut bat = vec![0u8; BAT_ENTRIES * CELL_SIZE];
        let empty = Cell::Empty.to_raw().to_le_bytes();
        for cell in 0..BAT_ENTRIES {
            bat[cell * CELL_SIZE..(cell + 1) * CELL_SIZE].copy_from_slice(&empty);
        }
        self.device.write_at(&bat, BAT_OFF);
        self.device.sync();
    }

    pub fn sync(&self) {
        self.device.sync();
    }
}

/// Typed disk accessors. Nothing outside this block computes raw image
/// offsets from layout constants.
impl ChainFs {
    pub(crate) fn read_entry(&self, offset: u64) -> DirEntry {
        let mut buf = [0u8; ENTRY_SIZE];
        self.device.read_at(&mut buf, offset);
        DirEntry::from_bytes(&buf)
    }

    pub(crate) fn write_entry(&self, offset: u64, entry: &DirEntry) {
        self.device.write_at(&entry.to_bytes(), offset);
    }

    pub(crate) fn read_cell(&self, block: u32) -> Cell {
        let mut buf = [0u8; CELL_SIZE];
        self.device.read_at(&mut buf, Self::cell_off(block));
        Cell::from_raw(u32::from_le_bytes(buf))
    }

    pub(crate) fn write_cell(&self, block: u32, cell: Cell) {
        self.device
            .write_at(&cell.to_raw().to_le_bytes(), Self::cell_off(block));
    }

    /// Byte offset where `block`'s data begins.
    pub(crate) fn block_off(block: u32) -> u64 {
        DATA_OFF + block as u64 * BLOCK_SIZE as u64
    }

    fn cell_off(block: u32) -> u64 {
        BAT_OFF + block as u64 * CELL_SIZE as u64
    }

    pub(crate) fn read_data(&self, block: u32, offset: usize, buf: &mut [u8]) {
        debug_assert!(offset + buf.len() <= BLOCK_SIZE);
        self.device.read_at(buf, Self::block_off(block) + offset as u64);
    }

    pub(crate) fn write_data(&self, block: u32, offset: usize, buf: &[u8]) {
        debug_assert!(offset + buf.len() <= BLOCK_SIZE);
        self.device.write_at(buf, Self::block_off(block) + offset as u64);
    }

    pub(crate) fn zero_block(&self, block: u32) {
        self.write_data(block, 0, &[0u8; BLOCK_SIZE]);
    }
}
