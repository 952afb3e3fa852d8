//! Metadata client abstraction
//!
//! This module defines the narrow client API that workers drive. The real
//! metadata service is an external collaborator; mdpulse only needs a handful
//! of path-based calls (create, open, close, read, write, truncate, mkdir,
//! rmdir, unlink, getattr) and reports every failure as an [`Errno`].
//!
//! # Implementations
//!
//! - **LocalClient**: maps the namespace onto a directory of the local filesystem
//! - **MockClient**: in-memory namespace with call tracking and failure injection
//! - **RemoteClient**: forwards metadata calls over a request channel
//!
//! # Example
//!
//! ```
//! use mdpulse::client::{MetadataClient, mock::MockClient};
//!
//! let mut client = MockClient::new();
//! client.mkdir("/a", 0o777).unwrap();
//! let handle = client.create("/a/f", 0o644).unwrap();
//! client.close(handle).unwrap();
//! assert!(client.getattr("/a/f").is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod local;
pub mod mock;
pub mod remote;

/// Metadata operation kinds tracked by the benchmark and carried on the wire
///
/// The set is closed. The declaration order is also the wire discriminant
/// order (0..=4) and the slot index order in per-worker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    MakeDir,
    RemoveDir,
    Create,
    Unlink,
    Stat,
}

impl OperationKind {
    /// Number of operation kinds
    pub const COUNT: usize = 5;

    /// All kinds in index order
    pub const ALL: [OperationKind; Self::COUNT] = [
        OperationKind::MakeDir,
        OperationKind::RemoveDir,
        OperationKind::Create,
        OperationKind::Unlink,
        OperationKind::Stat,
    ];

    /// Dense index of this kind (0..COUNT)
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire discriminant
    #[inline]
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    /// Decode a wire discriminant
    pub fn from_wire(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Short lowercase name used in reports
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::MakeDir => "mkdir",
            OperationKind::RemoveDir => "rmdir",
            OperationKind::Create => "creat",
            OperationKind::Unlink => "unlink",
            OperationKind::Stat => "stat",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Positive errno value describing a failed client operation
///
/// On the wire and at the C boundary errors travel as negative result codes
/// (`-EEXIST`, ...); inside the crate they are carried as `Errno`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub const ENOENT: Errno = Errno(libc::ENOENT);
    pub const EIO: Errno = Errno(libc::EIO);
    pub const EBADF: Errno = Errno(libc::EBADF);
    pub const EEXIST: Errno = Errno(libc::EEXIST);
    pub const ENOTDIR: Errno = Errno(libc::ENOTDIR);
    pub const EISDIR: Errno = Errno(libc::EISDIR);
    pub const EINVAL: Errno = Errno(libc::EINVAL);
    pub const ENAMETOOLONG: Errno = Errno(libc::ENAMETOOLONG);
    pub const ENOTEMPTY: Errno = Errno(libc::ENOTEMPTY);
    pub const EOPNOTSUPP: Errno = Errno(libc::EOPNOTSUPP);

    /// Convert an IO error, falling back to EIO when it carries no OS code
    pub fn from_io(err: &std::io::Error) -> Self {
        Errno(err.raw_os_error().unwrap_or(libc::EIO))
    }

    /// Interpret a result code: negative values are errors, anything else is success
    pub fn check(code: i32) -> Result<i32, Errno> {
        if code < 0 {
            Err(Errno(-code))
        } else {
            Ok(code)
        }
    }

    /// Negative result code for the wire and the C ABI
    #[inline]
    pub fn to_result_code(self) -> i32 {
        -self.0
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", std::io::Error::from_raw_os_error(self.0), self.0)
    }
}

impl std::error::Error for Errno {}

impl From<std::io::Error> for Errno {
    fn from(err: std::io::Error) -> Self {
        Errno::from_io(&err)
    }
}

/// Result of a client operation
pub type OpResult<T> = std::result::Result<T, Errno>;

/// Opaque handle to an open file, owned by the client that issued it
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FileHandle(u64);

impl FileHandle {
    /// Wrap a client-specific handle value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Client-specific handle value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// File attributes returned by `getattr`
///
/// A portable subset of `struct stat`; the shim copies it into the caller's
/// buffer and the wire protocol carries it in fixed-width fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub size: i64,
    pub blksize: i64,
    pub blocks: i64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl FileStat {
    /// Whether the mode bits describe a directory
    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32
    }

    /// Whether the mode bits describe a regular file
    pub fn is_file(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFREG as u32
    }

    /// Build from local filesystem metadata
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.size() as i64,
            blksize: meta.blksize() as i64,
            blocks: meta.blocks() as i64,
            atime: meta.atime(),
            mtime: meta.mtime(),
            ctime: meta.ctime(),
        }
    }

    /// Copy into a libc `stat` buffer
    ///
    /// Fields not carried by `FileStat` are zeroed.
    pub fn write_to(&self, st: &mut libc::stat) {
        // SAFETY: libc::stat is plain old data; all-zero is a valid value
        *st = unsafe { std::mem::zeroed() };
        st.st_ino = self.ino as _;
        st.st_mode = self.mode as _;
        st.st_nlink = self.nlink as _;
        st.st_uid = self.uid as _;
        st.st_gid = self.gid as _;
        st.st_size = self.size as _;
        st.st_blksize = self.blksize as _;
        st.st_blocks = self.blocks as _;
        st.st_atime = self.atime as _;
        st.st_mtime = self.mtime as _;
        st.st_ctime = self.ctime as _;
    }
}

/// Path-based metadata client consumed by workers and the server
///
/// Every call returns an [`Errno`] on failure; a failure is an ordinary
/// outcome that the caller records, not an exceptional condition.
///
/// # Thread Safety
///
/// Clients must be `Send` so each worker thread can own one. They are not
/// required to be `Sync`.
pub trait MetadataClient: Send {
    /// Create a regular file and return an open handle to it
    fn create(&mut self, path: &str, mode: u32) -> OpResult<FileHandle>;

    /// Open an existing regular file
    fn open(&mut self, path: &str) -> OpResult<FileHandle>;

    /// Close a handle returned by `create` or `open`
    fn close(&mut self, handle: FileHandle) -> OpResult<()>;

    /// Read at `offset`, returning the number of bytes read
    fn read(&mut self, handle: &FileHandle, buf: &mut [u8], offset: u64) -> OpResult<usize>;

    /// Write at `offset`, returning the number of bytes written
    fn write(&mut self, handle: &FileHandle, buf: &[u8], offset: u64) -> OpResult<usize>;

    /// Set the file size
    fn truncate(&mut self, handle: &FileHandle, size: u64) -> OpResult<()>;

    /// Create a directory
    fn mkdir(&mut self, path: &str, mode: u32) -> OpResult<()>;

    /// Remove an empty directory
    fn rmdir(&mut self, path: &str) -> OpResult<()>;

    /// Remove a regular file
    fn unlink(&mut self, path: &str) -> OpResult<()>;

    /// Fetch attributes
    fn getattr(&mut self, path: &str) -> OpResult<FileStat>;
}

impl<C: MetadataClient + ?Sized> MetadataClient for Box<C> {
    fn create(&mut self, path: &str, mode: u32) -> OpResult<FileHandle> {
        (**self).create(path, mode)
    }
    fn open(&mut self, path: &str) -> OpResult<FileHandle> {
        (**self).open(path)
    }
    fn close(&mut self, handle: FileHandle) -> OpResult<()> {
        (**self).close(handle)
    }
    fn read(&mut self, handle: &FileHandle, buf: &mut [u8], offset: u64) -> OpResult<usize> {
        (**self).read(handle, buf, offset)
    }
    fn write(&mut self, handle: &FileHandle, buf: &[u8], offset: u64) -> OpResult<usize> {
        (**self).write(handle, buf, offset)
    }
    fn truncate(&mut self, handle: &FileHandle, size: u64) -> OpResult<()> {
        (**self).truncate(handle, size)
    }
    fn mkdir(&mut self, path: &str, mode: u32) -> OpResult<()> {
        (**self).mkdir(path, mode)
    }
    fn rmdir(&mut self, path: &str) -> OpResult<()> {
        (**self).rmdir(path)
    }
    fn unlink(&mut self, path: &str) -> OpResult<()> {
        (**self).unlink(path)
    }
    fn getattr(&mut self, path: &str) -> OpResult<FileStat> {
        (**self).getattr(path)
    }
}
