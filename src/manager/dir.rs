use crate::config::{DIR_ENTRIES, ENTRY_SIZE, ROOT_ENTRIES, ROOT_OFF};
use crate::layout::entry::DirEntry;
use crate::manager::device::ChainFs;
use crate::manager::error_code::{FsError, FsResult};

/// A directory region: one contiguous slot array, root-sized or
/// subdirectory-sized.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DirRegion {
    pub offset: u64,
    pub capacity: usize,
}

impl DirRegion {
    pub fn slot_off(&self, slot: usize) -> u64 {
        self.offset + (slot * ENTRY_SIZE) as u64
    }
}

impl ChainFs {
    /// Region of the directory `entry` resolved from `path`. The root has
    /// its own fixed region and capacity; everything else sits in the
    /// two-block span behind the entry's first block.
    pub(crate) fn dir_region(&self, path: &str, entry: &DirEntry) -> DirRegion {
        if path == "/" {
            DirRegion {
                offset: ROOT_OFF,
                capacity: ROOT_ENTRIES,
            }
        } else {
            DirRegion {
                offset: Self::block_off(entry.first_block),
                capacity: DIR_ENTRIES,
            }
        }
    }

    /// First slot with an empty name.
    pub(crate) fn find_free_slot(&self, region: DirRegion) -> FsResult<u64> {
        (0..region.capacity)
            .map(|slot| region.slot_off(slot))
            .find(|&offset| self.read_entry(offset).is_free())
            .ok_or(FsError::NoSpace)
    }

    pub(crate) fn dir_is_empty(&self, region: DirRegion) -> bool {
        (0..region.capacity).all(|slot| self.read_entry(region.slot_off(slot)).is_free())
    }
}
