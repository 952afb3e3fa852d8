//! Metadata client that forwards calls over a request channel
//!
//! Only the metadata subset travels on the wire: mkdir, rmdir, create,
//! unlink and getattr. The handler performs create + close as one request,
//! so `create` hands back a placeholder handle and `close` is local. Data
//! calls (open, read, write, truncate) fail with EOPNOTSUPP.

use super::{Errno, FileHandle, FileStat, MetadataClient, OpResult, OperationKind};
use crate::channel::ClientTransport;
use crate::protocol::{MDRequest, MDResponse, WireError};
use tracing::warn;

/// Client forwarding metadata calls to a remote handler
pub struct RemoteClient<T: ClientTransport> {
    transport: T,
}

impl<T: ClientTransport> RemoteClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn client_id(&self) -> u64 {
        self.transport.client_id()
    }

    fn call(&self, op: OperationKind, path: &str, mode: u32) -> OpResult<MDResponse> {
        let request = MDRequest::new(op, path, mode, self.transport.client_id()).map_err(|e| match e {
            WireError::PathTooLong { .. } => Errno::ENAMETOOLONG,
            _ => Errno::EINVAL,
        })?;
        let response = self.transport.call(&request).map_err(|e| {
            warn!(op = %op, path, error = %e, "request channel failed");
            Errno::EIO
        })?;
        Errno::check(response.result)?;
        Ok(response)
    }
}

impl<T: ClientTransport> MetadataClient for RemoteClient<T> {
    fn create(&mut self, path: &str, mode: u32) -> OpResult<FileHandle> {
        self.call(OperationKind::Create, path, mode)?;
        Ok(FileHandle::from_raw(0))
    }

    fn open(&mut self, _path: &str) -> OpResult<FileHandle> {
        Err(Errno::EOPNOTSUPP)
    }

    fn close(&mut self, _handle: FileHandle) -> OpResult<()> {
        Ok(())
    }

    fn read(&mut self, _handle: &FileHandle, _buf: &mut [u8], _offset: u64) -> OpResult<usize> {
        Err(Errno::EOPNOTSUPP)
    }

    fn write(&mut self, _handle: &FileHandle, _buf: &[u8], _offset: u64) -> OpResult<usize> {
        Err(Errno::EOPNOTSUPP)
    }

    fn truncate(&mut self, _handle: &FileHandle, _size: u64) -> OpResult<()> {
        Err(Errno::EOPNOTSUPP)
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> OpResult<()> {
        self.call(OperationKind::MakeDir, path, mode).map(|_| ())
    }

    fn rmdir(&mut self, path: &str) -> OpResult<()> {
        self.call(OperationKind::RemoveDir, path, 0).map(|_| ())
    }

    fn unlink(&mut self, path: &str) -> OpResult<()> {
        self.call(OperationKind::Unlink, path, 0).map(|_| ())
    }

    fn getattr(&mut self, path: &str) -> OpResult<FileStat> {
        self.call(OperationKind::Stat, path, 0).map(|r| r.stat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory::MemoryChannel;
    use crate::channel::ServerTransport;

    #[test]
    fn test_remote_forwards_and_maps_result() {
        let channel = MemoryChannel::new(4, 1);
        let server = channel.server();
        let mut client = RemoteClient::new(channel.client(0).unwrap());

        let handler = std::thread::spawn(move || {
            let req = server.recv_request().unwrap();
            assert_eq!(req.op(), OperationKind::MakeDir);
            assert_eq!(req.path(), "/d");
            assert_eq!(req.mode(), 0o755);
            server.send_response(0, &MDResponse::with_result(-libc::EEXIST)).unwrap();

            let req = server.recv_request().unwrap();
            assert_eq!(req.op(), OperationKind::Stat);
            let stat = FileStat { ino: 3, mode: libc::S_IFDIR as u32 | 0o755, ..Default::default() };
            server.send_response(0, &MDResponse { result: 0, stat }).unwrap();
        });

        assert_eq!(client.mkdir("/d", 0o755), Err(Errno::EEXIST));
        let stat = client.getattr("/d").unwrap();
        assert!(stat.is_dir());
        assert_eq!(stat.ino, 3);
        handler.join().unwrap();
    }

    #[test]
    fn test_remote_rejects_long_path_locally() {
        let channel = MemoryChannel::new(1, 1);
        let server = channel.server();
        let mut client = RemoteClient::new(channel.client(0).unwrap());

        let long = format!("/{}", "x".repeat(600));
        assert_eq!(client.unlink(&long), Err(Errno::ENAMETOOLONG));
        assert_eq!(server.pending(), 0);
    }

    #[test]
    fn test_remote_data_calls_unsupported() {
        let channel = MemoryChannel::new(1, 1);
        let mut client = RemoteClient::new(channel.client(0).unwrap());
        assert_eq!(client.open("/f").err(), Some(Errno::EOPNOTSUPP));
    }
}
