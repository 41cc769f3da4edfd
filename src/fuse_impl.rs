use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyWrite, Request, TimeOrNow, FUSE_ROOT_ID,
};
use log::debug;

use crate::config::BLOCK_SIZE;
use crate::manager::device::ChainFs;
use crate::manager::error_code::FsError;
use crate::manager::path::split_parent;
use crate::typ::file_type::FileType;

const TTL: Duration = Duration::new(1, 0);

/// Glue between fuser's inode-numbered callbacks and the path-based
/// filesystem core. Inode numbers exist only in this table; no semantics
/// live here.
pub struct FuseFs {
    fs: ChainFs,
    paths: HashMap<u64, String>,
    inos: HashMap<String, u64>,
    next_ino: u64,
}

impl FuseFs {
    pub fn new(fs: ChainFs) -> Self {
        let mut paths = HashMap::new();
        let mut inos = HashMap::new();
        paths.insert(FUSE_ROOT_ID, "/".to_string());
        inos.insert("/".to_string(), FUSE_ROOT_ID);
        Self {
            fs,
            paths,
            inos,
            next_ino: FUSE_ROOT_ID + 1,
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    fn ino_of(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inos.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inos.insert(path.to_string(), ino);
        self.paths.insert(ino, path.to_string());
        ino
    }

    fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.inos.remove(path) {
            self.paths.remove(&ino);
        }
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent = self.paths.get(&parent)?;
        let name = name.to_str()?;
        Some(join(parent, name))
    }

    /// Attributes for `path`: kind/size/nlink from the entry, ownership
    /// from the request, timestamps from the wall clock (nothing is
    /// persisted for them).
    fn attr(&mut self, req: &Request<'_>, path: &str) -> Result<FileAttr, FsError> {
        let meta = self.fs.getattr(path)?;
        let ino = self.ino_of(path);
        let now = SystemTime::now();
        Ok(FileAttr {
            ino,
            size: meta.size,
            blocks: meta.size.div_ceil(BLOCK_SIZE as u64),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind: meta.kind.into(),
            perm: match meta.kind {
                FileType::Dir => 0o755,
                FileType::File => 0o644,
            },
            nlink: meta.nlink,
            uid: req.uid(),
            gid: req.gid(),
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        })
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}

impl Filesystem for FuseFs {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            return reply.error(libc::ENOENT);
        };
        match self.attr(req, &path) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(libc::ENOENT);
        };
        match self.attr(req, &path) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(libc::ENOENT);
        };
        // Only the size is persisted; everything else is synthesized.
        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(&path, size) {
                return reply.error(e.errno());
            }
        }
        match self.attr(req, &path) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            return reply.error(libc::ENOENT);
        };
        if let Err(e) = self.fs.create(&path) {
            debug!("mknod {}: {}", path, e);
            return reply.error(e.errno());
        }
        match self.attr(req, &path) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            return reply.error(libc::ENOENT);
        };
        if let Err(e) = self.fs.mkdir(&path) {
            debug!("mkdir {}: {}", path, e);
            return reply.error(e.errno());
        }
        match self.attr(req, &path) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            return reply.error(libc::ENOENT);
        };
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok()
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            return reply.error(libc::ENOENT);
        };
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok()
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(libc::ENOENT);
        };
        if offset < 0 {
            return reply.error(libc::EINVAL);
        }
        match self.fs.read(&path, size as usize, offset as u64) {
            Ok(buf) => reply.data(&buf),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(libc::ENOENT);
        };
        if offset < 0 {
            return reply.error(libc::EINVAL);
        }
        match self.fs.write(&path, data, offset as u64) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            return reply.error(libc::ENOENT);
        };
        let rows = match self.fs.readdir(&path) {
            Ok(rows) => rows,
            Err(e) => return reply.error(e.errno()),
        };
        for (index, row) in rows.iter().enumerate().skip(offset as usize) {
            let row_ino = match row.name.as_str() {
                "." => ino,
                ".." => {
                    let (parent, _) = split_parent(&path).unwrap_or(("/", ""));
                    self.ino_of(parent)
                }
                name => self.ino_of(&join(&path, name)),
            };
            if reply.add(row_ino, (index + 1) as i64, row.kind.into(), &row.name) {
                break;
            }
        }
        reply.ok()
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            return reply.error(libc::ENOENT);
        };
        if let Err(e) = self.fs.create(&path) {
            debug!("create {}: {}", path, e);
            return reply.error(e.errno());
        }
        match self.attr(req, &path) {
            Ok(attr) => reply.created(&TTL, &attr, 0, 0, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok()
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        self.fs.sync();
        reply.ok()
    }
}
