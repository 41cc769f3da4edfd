pub mod alloc;
pub mod device;
pub mod dir;
pub mod error_code;
pub mod file_system;
pub mod path;

use crate::typ::file_type::FileType;

/// Attribute record synthesized by `getattr`. Ownership and timestamps
/// are not persisted; the FUSE layer fills them in per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileType,
    pub size: u64,
    pub nlink: u32,
}

/// One `readdir` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryDetail {
    pub name: String,
    pub kind: FileType,
    pub size: u64,
}
