//! Local filesystem client
//!
//! Maps the client namespace onto a directory of the local filesystem, so
//! `/a/b` resolves to `<root>/a/b`. Used by the metadata server and for
//! benchmarking a local or network-mounted filesystem directly.

use super::{Errno, FileHandle, FileStat, MetadataClient, OpResult};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::{DirBuilderExt, FileExt, OpenOptionsExt};
use std::path::{Component, Path, PathBuf};

/// Client backed by a local directory
pub struct LocalClient {
    root: PathBuf,
    files: HashMap<u64, File>,
    next_handle: u64,
}

impl LocalClient {
    /// Create a client rooted at `root`
    ///
    /// The root must already exist; it is not created here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Namespace root on the local filesystem
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a namespace path below the root
    ///
    /// Leading slashes are stripped and `..` components are rejected with
    /// `EINVAL`, so a path never resolves outside the root.
    fn resolve(&self, path: &str) -> OpResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Errno::EINVAL);
        }
        Ok(self.root.join(relative))
    }

    fn insert(&mut self, file: File) -> FileHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.files.insert(id, file);
        FileHandle::from_raw(id)
    }

    fn file(&self, handle: &FileHandle) -> OpResult<&File> {
        self.files.get(&handle.raw()).ok_or(Errno::EBADF)
    }
}

impl MetadataClient for LocalClient {
    fn create(&mut self, path: &str, mode: u32) -> OpResult<FileHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(self.resolve(path)?)?;
        Ok(self.insert(file))
    }

    fn open(&mut self, path: &str) -> OpResult<FileHandle> {
        let file = OpenOptions::new().read(true).write(true).open(self.resolve(path)?)?;
        Ok(self.insert(file))
    }

    fn close(&mut self, handle: FileHandle) -> OpResult<()> {
        self.files.remove(&handle.raw()).map(drop).ok_or(Errno::EBADF)
    }

    fn read(&mut self, handle: &FileHandle, buf: &mut [u8], offset: u64) -> OpResult<usize> {
        Ok(self.file(handle)?.read_at(buf, offset)?)
    }

    fn write(&mut self, handle: &FileHandle, buf: &[u8], offset: u64) -> OpResult<usize> {
        Ok(self.file(handle)?.write_at(buf, offset)?)
    }

    fn truncate(&mut self, handle: &FileHandle, size: u64) -> OpResult<()> {
        Ok(self.file(handle)?.set_len(size)?)
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> OpResult<()> {
        Ok(fs::DirBuilder::new().mode(mode).create(self.resolve(path)?)?)
    }

    fn rmdir(&mut self, path: &str) -> OpResult<()> {
        Ok(fs::remove_dir(self.resolve(path)?)?)
    }

    fn unlink(&mut self, path: &str) -> OpResult<()> {
        Ok(fs::remove_file(self.resolve(path)?)?)
    }

    fn getattr(&mut self, path: &str) -> OpResult<FileStat> {
        let meta = fs::symlink_metadata(self.resolve(path)?)?;
        Ok(FileStat::from_metadata(&meta))
    }
}
