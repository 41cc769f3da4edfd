use crate::config::{
    BLOCKIDX_EMPTY, BLOCKIDX_END, DIRECTORY_FLAG, ENTRY_SIZE, FILENAME_MAX, SIZE_MASK,
};
use crate::typ::file_name::FileName;
use crate::typ::file_type::FileType;

/// One directory slot: a name, the head of the block chain, and the size
/// field whose high bit marks directories. Serialized by hand so the
/// on-disk record is exactly `ENTRY_SIZE` bytes, little-endian, with no
/// compiler padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: FileName,
    pub first_block: u32,
    pub size: u32,
}

impl DirEntry {
    /// The free-slot pattern: NUL name, no chain.
    pub fn free() -> Self {
        Self {
            name: FileName::empty(),
            first_block: BLOCKIDX_EMPTY,
            size: 0,
        }
    }

    /// A fresh zero-length regular file.
    pub fn new_file(name: FileName) -> Self {
        Self {
            name,
            first_block: BLOCKIDX_END,
            size: 0,
        }
    }

    pub fn new_dir(name: FileName, first_block: u32) -> Self {
        Self {
            name,
            first_block,
            size: DIRECTORY_FLAG,
        }
    }

    /// Synthetic entry for `/`, which has no persisted slot.
    pub fn root() -> Self {
        Self {
            name: FileName::empty(),
            first_block: 0,
            size: DIRECTORY_FLAG,
        }
    }

    pub fn is_free(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_dir(&self) -> bool {
        self.size & DIRECTORY_FLAG != 0
    }

    pub fn kind(&self) -> FileType {
        if self.is_dir() {
            FileType::Dir
        } else {
            FileType::File
        }
    }

    pub fn file_size(&self) -> u32 {
        self.size & SIZE_MASK
    }

    /// Head of the block chain, or None for a zero-length file.
    pub fn chain_start(&self) -> Option<u32> {
        match self.first_block {
            BLOCKIDX_END | BLOCKIDX_EMPTY => None,
            block => Some(block),
        }
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[..FILENAME_MAX].copy_from_slice(self.name.raw());
        buf[FILENAME_MAX..FILENAME_MAX + 4].copy_from_slice(&self.first_block.to_le_bytes());
        buf[FILENAME_MAX + 4..].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; ENTRY_SIZE]) -> Self {
        let mut name = [0u8; FILENAME_MAX];
        name.copy_from_slice(&buf[..FILENAME_MAX]);
        let first_block = u32::from_le_bytes(buf[FILENAME_MAX..FILENAME_MAX + 4].try_into().unwrap());
        let size = u32::from_le_bytes(buf[FILENAME_MAX + 4..].try_into().unwrap());
        Self {
            name: name.into(),
            first_block,
            size,
        }
    }
}
