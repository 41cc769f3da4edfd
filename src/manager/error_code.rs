use libc::c_int;
use thiserror::Error;

/// Error kinds surfaced by every operation; `errno` gives the value
/// handed back to the FUSE layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("file exists")]
    AlreadyExists,
    #[error("directory not empty")]
    NotEmpty,
    #[error("no space left on device")]
    NoSpace,
    #[error("file name too long")]
    NameTooLong,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("file too large")]
    FileTooBig,
    #[error("device or resource busy")]
    Busy,
}

impl FsError {
    pub fn errno(self) -> c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::NoSpace => libc::ENOSPC,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::FileTooBig => libc::EFBIG,
            FsError::Busy => libc::EBUSY,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
