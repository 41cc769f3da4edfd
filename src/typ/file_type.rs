/// The two kinds this disk format encodes: the size field's high bit
/// distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

impl From<FileType> for fuser::FileType {
    fn from(kind: FileType) -> Self {
        match kind {
            FileType::File => fuser::FileType::RegularFile,
            FileType::Dir => fuser::FileType::Directory,
        }
    }
}
