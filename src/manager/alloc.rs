use log::debug;

use crate::config::BAT_ENTRIES;
use crate::layout::cell::Cell;
use crate::manager::device::ChainFs;

/// Block allocator: first-fit scans over the allocation table, plus the
/// chain walkers built on it.
impl ChainFs {
    /// First free cell, lowest index wins.
    pub(crate) fn find_free_block(&self) -> Option<u32> {
        (0..BAT_ENTRIES as u32).find(|&block| self.read_cell(block) == Cell::Empty)
    }

    /// Adjacent free pair for a directory region. The slot array is
    /// addressed as one contiguous span, so its two blocks must neighbor
    /// each other; nothing is written until both are reserved.
    pub(crate) fn find_free_pair(&self) -> Option<(u32, u32)> {
        let found = (0..BAT_ENTRIES as u32 - 1).find(|&block| {
            self.read_cell(block) == Cell::Empty && self.read_cell(block + 1) == Cell::Empty
        });
        if found.is_none() {
            debug!("no adjacent free block pair for a new directory");
        }
        found.map(|block| (block, block + 1))
    }

    /// Allocates a block as a fresh chain tail: zero-filled, its cell set
    /// END, then (when given) linked behind `prev`. The terminator lands
    /// before the link so an interrupted pair of cell writes never leaves
    /// a chain running into a free cell.
    pub(crate) fn alloc_linked(&self, prev: Option<u32>) -> Option<u32> {
        let block = self.find_free_block()?;
        self.zero_block(block);
        self.write_cell(block, Cell::End);
        if let Some(prev) = prev {
            self.write_cell(prev, Cell::Next(block));
        }
        Some(block)
    }

    /// Frees every cell from `start` to the end of its chain. Lenient on
    /// sentinels: called with END or EMPTY it is a no-op, and a walk that
    /// runs into EMPTY stops there instead of cascading into free blocks.
    pub(crate) fn free_block_chain(&self, start: u32) {
        let mut current = Cell::from_raw(start);
        while let Cell::Next(block) = current {
            let next = self.read_cell(block);
            self.write_cell(block, Cell::Empty);
            current = next;
        }
    }
}
