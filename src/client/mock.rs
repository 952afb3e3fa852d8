//! Mock metadata client for testing
//!
//! This module provides an in-memory implementation of [`MetadataClient`]. It
//! keeps a real namespace (so `mkdir` on an existing path fails with EEXIST and
//! `rmdir` on a non-empty directory fails with ENOTEMPTY), records every call,
//! and can inject failures for chosen operations and paths.
//!
//! Clones share state, so a test can keep one clone for inspection while a
//! worker owns another.
//!
//! # Example
//!
//! ```
//! use mdpulse::client::{Errno, MetadataClient, OperationKind, mock::MockClient};
//!
//! let mut client = MockClient::new();
//! client.fail_on(OperationKind::MakeDir, "/x", Errno::EIO);
//!
//! assert_eq!(client.mkdir("/x", 0o777), Err(Errno::EIO));
//! assert_eq!(client.calls().len(), 1);
//! ```

use super::{Errno, FileHandle, FileStat, MetadataClient, OpResult, OperationKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Record of a call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCall {
    pub kind: CallKind,
    pub path: String,
}

/// Every call the client API exposes, including the non-metadata ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Metadata(OperationKind),
    Open,
    Close,
    Read,
    Write,
    Truncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Dir { mode: u32 },
    File { mode: u32, size: u64 },
}

#[derive(Debug, Default)]
struct MockState {
    nodes: BTreeMap<String, Node>,
    calls: Vec<ClientCall>,
    failures: HashMap<(OperationKind, String), Errno>,
    open_files: HashMap<u64, String>,
    next_handle: u64,
    next_ino: u64,
    inodes: HashMap<String, u64>,
}

/// In-memory metadata client
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

impl MockClient {
    /// Create an empty namespace containing only `/`
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` inside every metadata call
    ///
    /// Gives tests non-zero, distinguishable latencies.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail every `kind` call on `path` with `errno`
    pub fn fail_on(&self, kind: OperationKind, path: &str, errno: Errno) {
        self.lock().failures.insert((kind, path.to_string()), errno);
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<ClientCall> {
        self.lock().calls.clone()
    }

    /// Paths of calls of one metadata kind, in order
    pub fn paths_for(&self, kind: OperationKind) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind == CallKind::Metadata(kind))
            .map(|c| c.path.clone())
            .collect()
    }

    /// Whether `path` currently exists
    pub fn exists(&self, path: &str) -> bool {
        path == "/" || self.lock().nodes.contains_key(path)
    }

    /// Number of entries in the namespace, excluding the root
    pub fn entry_count(&self) -> usize {
        self.lock().nodes.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A poisoned mock only happens after a panicking test thread
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, kind: CallKind, path: &str) -> MutexGuard<'_, MockState> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let mut state = self.lock();
        state.calls.push(ClientCall {
            kind,
            path: path.to_string(),
        });
        state
    }

    fn injected(state: &MockState, kind: OperationKind, path: &str) -> OpResult<()> {
        match state.failures.get(&(kind, path.to_string())) {
            Some(errno) => Err(*errno),
            None => Ok(()),
        }
    }
}

impl MockState {
    fn lookup(&self, path: &str) -> Option<Node> {
        if path == "/" {
            return Some(Node::Dir { mode: 0o755 });
        }
        self.nodes.get(path).copied()
    }

    fn check_parent(&self, path: &str) -> OpResult<()> {
        match self.lookup(parent_of(path)) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(Errno::ENOTDIR),
            None => Err(Errno::ENOENT),
        }
    }

    fn has_children(&self, path: &str) -> bool {
        let prefix = format!("{}/", path);
        self.nodes
            .range(prefix.clone()..)
            .next()
            .map_or(false, |(k, _)| k.starts_with(&prefix))
    }

    fn ino(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inodes.get(path) {
            return *ino;
        }
        self.next_ino += 1;
        let ino = self.next_ino;
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    fn open_handle(&mut self, path: &str) -> FileHandle {
        self.next_handle += 1;
        self.open_files.insert(self.next_handle, path.to_string());
        FileHandle::from_raw(self.next_handle)
    }

    fn handle_path(&self, handle: &FileHandle) -> OpResult<String> {
        self.open_files.get(&handle.raw()).cloned().ok_or(Errno::EBADF)
    }
}

impl MetadataClient for MockClient {
    fn create(&mut self, path: &str, mode: u32) -> OpResult<FileHandle> {
        let mut state = self.begin(CallKind::Metadata(OperationKind::Create), path);
        Self::injected(&state, OperationKind::Create, path)?;
        state.check_parent(path)?;
        match state.lookup(path) {
            Some(Node::Dir { .. }) => return Err(Errno::EISDIR),
            _ => {
                state.nodes.insert(path.to_string(), Node::File { mode, size: 0 });
            }
        }
        Ok(state.open_handle(path))
    }

    fn open(&mut self, path: &str) -> OpResult<FileHandle> {
        let mut state = self.begin(CallKind::Open, path);
        match state.lookup(path) {
            Some(Node::File { .. }) => Ok(state.open_handle(path)),
            Some(Node::Dir { .. }) => Err(Errno::EISDIR),
            None => Err(Errno::ENOENT),
        }
    }

    fn close(&mut self, handle: FileHandle) -> OpResult<()> {
        let mut state = self.lock();
        let path = state.handle_path(&handle)?;
        state.calls.push(ClientCall {
            kind: CallKind::Close,
            path,
        });
        state.open_files.remove(&handle.raw());
        Ok(())
    }

    fn read(&mut self, handle: &FileHandle, buf: &mut [u8], offset: u64) -> OpResult<usize> {
        let path = self.lock().handle_path(handle)?;
        let state = self.begin(CallKind::Read, &path);
        match state.lookup(&path) {
            Some(Node::File { size, .. }) => {
                let available = size.saturating_sub(offset) as usize;
                let n = available.min(buf.len());
                buf[..n].fill(0);
                Ok(n)
            }
            _ => Err(Errno::ENOENT),
        }
    }

    fn write(&mut self, handle: &FileHandle, buf: &[u8], offset: u64) -> OpResult<usize> {
        let path = self.lock().handle_path(handle)?;
        let mut state = self.begin(CallKind::Write, &path);
        match state.nodes.get_mut(&path) {
            Some(Node::File { size, .. }) => {
                *size = (*size).max(offset + buf.len() as u64);
                Ok(buf.len())
            }
            _ => Err(Errno::ENOENT),
        }
    }

    fn truncate(&mut self, handle: &FileHandle, new_size: u64) -> OpResult<()> {
        let path = self.lock().handle_path(handle)?;
        let mut state = self.begin(CallKind::Truncate, &path);
        match state.nodes.get_mut(&path) {
            Some(Node::File { size, .. }) => {
                *size = new_size;
                Ok(())
            }
            _ => Err(Errno::ENOENT),
        }
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> OpResult<()> {
        let mut state = self.begin(CallKind::Metadata(OperationKind::MakeDir), path);
        Self::injected(&state, OperationKind::MakeDir, path)?;
        if state.lookup(path).is_some() {
            return Err(Errno::EEXIST);
        }
        state.check_parent(path)?;
        state.nodes.insert(path.to_string(), Node::Dir { mode });
        Ok(())
    }

    fn rmdir(&mut self, path: &str) -> OpResult<()> {
        let mut state = self.begin(CallKind::Metadata(OperationKind::RemoveDir), path);
        Self::injected(&state, OperationKind::RemoveDir, path)?;
        match state.lookup(path) {
            Some(Node::Dir { .. }) if path == "/" => Err(Errno::EINVAL),
            Some(Node::Dir { .. }) => {
                if state.has_children(path) {
                    return Err(Errno::ENOTEMPTY);
                }
                state.nodes.remove(path);
                Ok(())
            }
            Some(Node::File { .. }) => Err(Errno::ENOTDIR),
            None => Err(Errno::ENOENT),
        }
    }

    fn unlink(&mut self, path: &str) -> OpResult<()> {
        let mut state = self.begin(CallKind::Metadata(OperationKind::Unlink), path);
        Self::injected(&state, OperationKind::Unlink, path)?;
        match state.lookup(path) {
            Some(Node::File { .. }) => {
                state.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(Errno::EISDIR),
            None => Err(Errno::ENOENT),
        }
    }

    fn getattr(&mut self, path: &str) -> OpResult<FileStat> {
        let mut state = self.begin(CallKind::Metadata(OperationKind::Stat), path);
        Self::injected(&state, OperationKind::Stat, path)?;
        let node = state.lookup(path).ok_or(Errno::ENOENT)?;
        let ino = state.ino(path);
        let stat = match node {
            Node::Dir { mode } => FileStat {
                ino,
                mode: libc::S_IFDIR as u32 | (mode & 0o7777),
                nlink: 2,
                ..Default::default()
            },
            Node::File { mode, size } => FileStat {
                ino,
                mode: libc::S_IFREG as u32 | (mode & 0o7777),
                nlink: 1,
                size: size as i64,
                ..Default::default()
            },
        };
        Ok(stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_mkdir_requires_parent() {
        let mut client = MockClient::new();
        assert_eq!(client.mkdir("/a/b", 0o777), Err(Errno::ENOENT));
        client.mkdir("/a", 0o777).unwrap();
        client.mkdir("/a/b", 0o777).unwrap();
        assert_eq!(client.mkdir("/a/b", 0o777), Err(Errno::EEXIST));
    }

    #[test]
    fn test_mock_rmdir_not_empty() {
        let mut client = MockClient::new();
        client.mkdir("/a", 0o777).unwrap();
        client.mkdir("/a/b", 0o777).unwrap();
        assert_eq!(client.rmdir("/a"), Err(Errno::ENOTEMPTY));
        client.rmdir("/a/b").unwrap();
        client.rmdir("/a").unwrap();
        assert_eq!(client.entry_count(), 0);
    }

    #[test]
    fn test_mock_sibling_prefix_is_not_child() {
        let mut client = MockClient::new();
        client.mkdir("/a", 0o777).unwrap();
        client.mkdir("/ab", 0o777).unwrap();
        client.rmdir("/a").unwrap();
    }

    #[test]
    fn test_mock_create_and_stat() {
        let mut client = MockClient::new();
        let fh = client.create("/f", 0o644).unwrap();
        client.write(&fh, b"abc", 0).unwrap();
        client.close(fh).unwrap();

        let stat = client.getattr("/f").unwrap();
        assert!(stat.is_file());
        assert_eq!(stat.size, 3);
        assert_eq!(client.getattr("/f").unwrap().ino, stat.ino);
    }

    #[test]
    fn test_mock_unlink_directory() {
        let mut client = MockClient::new();
        client.mkdir("/d", 0o777).unwrap();
        assert_eq!(client.unlink("/d"), Err(Errno::EISDIR));
        assert_eq!(client.unlink("/missing"), Err(Errno::ENOENT));
    }

    #[test]
    fn test_mock_failure_injection_and_calls() {
        let mut client = MockClient::new();
        client.fail_on(OperationKind::Stat, "/x", Errno::EIO);
        assert_eq!(client.getattr("/x"), Err(Errno::EIO));
        assert_eq!(client.getattr("/y"), Err(Errno::ENOENT));

        assert_eq!(client.paths_for(OperationKind::Stat), vec!["/x", "/y"]);
    }

    #[test]
    fn test_mock_clones_share_state() {
        let observer = MockClient::new();
        let mut worker = observer.clone();
        worker.mkdir("/shared", 0o777).unwrap();
        assert!(observer.exists("/shared"));
    }
}
