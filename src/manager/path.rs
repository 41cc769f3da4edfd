use crate::config::{DIR_ENTRIES, ENTRY_SIZE, ROOT_ENTRIES, ROOT_OFF};
use crate::layout::entry::DirEntry;
use crate::manager::device::ChainFs;
use crate::manager::error_code::{FsError, FsResult};

/// Path components, borrowed from the input. Empty components collapse,
/// so no mutable copy of the path is ever taken.
pub(crate) fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Splits an absolute path into parent and leaf:
/// `/a/b` → (`/a`, `b`), `/a` → (`/`, `a`).
pub(crate) fn split_parent(path: &str) -> FsResult<(&str, &str)> {
    let split = path.rfind('/').ok_or(FsError::InvalidArgument)?;
    if !path.starts_with('/') {
        return Err(FsError::InvalidArgument);
    }
    let (parent, leaf) = path.split_at(split);
    let parent = if parent.is_empty() { "/" } else { parent };
    Ok((parent, &leaf[1..]))
}

impl ChainFs {
    /// Resolves an absolute path to its directory entry and the byte
    /// offset of the slot holding it. `/` resolves to a synthetic
    /// directory entry at the root region offset; resolution never
    /// mutates the disk.
    pub fn get_entry(&self, path: &str) -> FsResult<(DirEntry, u64)> {
        if !path.starts_with('/') {
            return Err(FsError::InvalidArgument);
        }
        if path == "/" {
            return Ok((DirEntry::root(), ROOT_OFF));
        }

        let mut region = ROOT_OFF;
        let mut capacity = ROOT_ENTRIES;
        let mut walker = components(path).peekable();

        while let Some(component) = walker.next() {
            let found = (0..capacity).find_map(|slot| {
                let offset = region + (slot * ENTRY_SIZE) as u64;
                let entry = self.read_entry(offset);
                entry.name.matches(component).then_some((entry, offset))
            });
            let (entry, offset) = found.ok_or(FsError::NotFound)?;

            if walker.peek().is_none() {
                return Ok((entry, offset));
            }
            if !entry.is_dir() {
                return Err(FsError::NotADirectory);
            }
            region = Self::block_off(entry.first_block);
            capacity = DIR_ENTRIES;
        }

        // Reached only for paths with no components at all ("//" and the
        // like): nothing to resolve.
        Err(FsError::NotFound)
    }
}
