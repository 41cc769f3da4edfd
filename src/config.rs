//! On-disk layout constants. Every byte offset on the image derives from
//! the values here; the rest of the crate reaches the disk through the
//! typed accessors on `ChainFs` instead of computing offsets itself.

/// Bytes per data block.
pub const BLOCK_SIZE: usize = 512;

/// Filename field width, including the trailing NUL.
pub const FILENAME_MAX: usize = 32;

/// One directory slot: name, first_block (u32), size field (u32).
pub const ENTRY_SIZE: usize = FILENAME_MAX + 8;

/// One block-allocation-table cell (u32, little-endian).
pub const CELL_SIZE: usize = 4;

/// Slot capacity of the root directory region.
pub const ROOT_ENTRIES: usize = 128;

/// Blocks backing a subdirectory's slot array.
pub const DIR_BLOCKS: usize = 2;

/// Slot capacity of a subdirectory: the whole array must fit in its
/// two-block region.
pub const DIR_ENTRIES: usize = DIR_BLOCKS * BLOCK_SIZE / ENTRY_SIZE;

/// Number of data blocks, and of allocation-table cells.
pub const BAT_ENTRIES: usize = 4096;

/// Low 31 bits of the size field: byte size of a regular file.
pub const SIZE_MASK: u32 = 0x7FFF_FFFF;

/// High bit of the size field: the entry is a directory.
pub const DIRECTORY_FLAG: u32 = 0x8000_0000;

/// Cell sentinel: the block is free. Outside the valid index range.
pub const BLOCKIDX_EMPTY: u32 = 0xFFFF_FFFF;

/// Cell sentinel: the block ends its chain. Outside the valid index range.
pub const BLOCKIDX_END: u32 = 0xFFFF_FFFE;

pub const ROOT_OFF: u64 = 0;
pub const BAT_OFF: u64 = ROOT_OFF + (ROOT_ENTRIES * ENTRY_SIZE) as u64;
pub const DATA_OFF: u64 = BAT_OFF + (BAT_ENTRIES * CELL_SIZE) as u64;

/// Total image size: root region, allocation table, data region.
pub const IMAGE_SIZE: u64 = DATA_OFF + (BAT_ENTRIES * BLOCK_SIZE) as u64;
