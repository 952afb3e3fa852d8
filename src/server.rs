//! Metadata request handler
//!
//! The handler end of the request channel: it receives [`MDRequest`]s from
//! any client, performs them against a [`MetadataClient`], and sends the
//! [`MDResponse`] to the requester's own response queue.

use crate::channel::{ChannelError, ServerTransport};
use crate::client::{MetadataClient, OperationKind};
use crate::protocol::{MDRequest, MDResponse};
use crate::Result;
use anyhow::Context;
use tracing::{debug, info, warn};

/// Serves metadata requests with a local client
pub struct MetadataServer<S: ServerTransport, C: MetadataClient> {
    transport: S,
    client: C,
    max_clients: usize,
    handled: u64,
    dropped: u64,
}

impl<S: ServerTransport, C: MetadataClient> MetadataServer<S, C> {
    /// Serve client ids `0..max_clients`
    pub fn new(transport: S, client: C, max_clients: usize) -> Self {
        Self {
            transport,
            client,
            max_clients,
            handled: 0,
            dropped: 0,
        }
    }

    /// Requests answered so far
    pub fn handled(&self) -> u64 {
        self.handled
    }

    /// Requests dropped: unknown client ids and undecodable records
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Perform one request and build its response
    pub fn handle(&mut self, request: &MDRequest) -> MDResponse {
        let path = request.path();
        let outcome = match request.op() {
            OperationKind::MakeDir => self.client.mkdir(path, request.mode()).map(|_| MDResponse::default()),
            OperationKind::RemoveDir => self.client.rmdir(path).map(|_| MDResponse::default()),
            OperationKind::Create => self
                .client
                .create(path, request.mode())
                .and_then(|handle| self.client.close(handle))
                .map(|_| MDResponse::default()),
            OperationKind::Unlink => self.client.unlink(path).map(|_| MDResponse::default()),
            OperationKind::Stat => self.client.getattr(path).map(|stat| MDResponse { result: 0, stat }),
        };
        match outcome {
            Ok(response) => response,
            Err(errno) => {
                debug!(op = %request.op(), path, %errno, client = request.client_id(), "request failed");
                MDResponse::with_result(errno.to_result_code())
            }
        }
    }

    /// Receive, perform and answer one request
    ///
    /// A record that does not decode carries no trustworthy client id, so it
    /// is dropped without a reply and the queue stays in service.
    pub fn serve_one(&mut self) -> std::result::Result<(), ChannelError> {
        let request = match self.transport.recv_request() {
            Ok(request) => request,
            Err(ChannelError::Wire(e)) => {
                self.dropped += 1;
                warn!(error = %e, "dropping malformed request");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let client_id = request.client_id();
        if client_id >= self.max_clients as u64 {
            self.dropped += 1;
            warn!(
                client = client_id,
                max_clients = self.max_clients,
                op = %request.op(),
                "dropping request from unknown client"
            );
            return Ok(());
        }
        let response = self.handle(&request);
        self.transport.send_response(client_id, &response)?;
        self.handled += 1;
        Ok(())
    }

    /// Serve exactly `n` requests
    pub fn serve_n(&mut self, n: u64) -> Result<()> {
        for i in 0..n {
            self.serve_one()
                .with_context(|| format!("serving request {} of {}", i + 1, n))?;
        }
        Ok(())
    }

    /// Serve until every client end is gone
    pub fn serve_forever(&mut self) -> Result<()> {
        info!(max_clients = self.max_clients, "metadata server running");
        loop {
            match self.serve_one() {
                Ok(()) => {}
                Err(ChannelError::Disconnected) => {
                    info!(handled = self.handled, dropped = self.dropped, "request channel closed");
                    return Ok(());
                }
                Err(e) => return Err(e).context("metadata server failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory::MemoryChannel;
    use crate::channel::ClientTransport;
    use crate::client::mock::MockClient;
    use crate::client::remote::RemoteClient;
    use crate::client::Errno;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[test]
    fn test_handle_maps_results() {
        let channel = MemoryChannel::new(1, 1);
        let mock = MockClient::new();
        let mut server = MetadataServer::new(channel.server(), mock.clone(), 1);

        let mkdir = MDRequest::new(OperationKind::MakeDir, "/d", 0o755, 0).unwrap();
        assert_eq!(server.handle(&mkdir).result, 0);
        assert_eq!(server.handle(&mkdir).result, -libc::EEXIST);

        let create = MDRequest::new(OperationKind::Create, "/d/f", 0o644, 0).unwrap();
        assert_eq!(server.handle(&create).result, 0);
        assert!(mock.exists("/d/f"));

        let stat = server.handle(&MDRequest::new(OperationKind::Stat, "/d/f", 0, 0).unwrap());
        assert_eq!(stat.result, 0);
        assert!(stat.stat.is_file());

        let missing = server.handle(&MDRequest::new(OperationKind::Unlink, "/nope", 0, 0).unwrap());
        assert_eq!(missing.result, Errno::ENOENT.to_result_code());
    }

    #[test]
    fn test_serve_n_with_remote_client() {
        let channel = MemoryChannel::new(4, 2);
        let mock = MockClient::new();
        let mut server = MetadataServer::new(channel.server(), mock.clone(), 2);
        let mut a = RemoteClient::new(channel.client(0).unwrap());
        let mut b = RemoteClient::new(channel.client(1).unwrap());

        let handle = std::thread::spawn(move || {
            server.serve_n(4).unwrap();
            server.handled()
        });

        a.mkdir("/x", 0o777).unwrap();
        assert_eq!(b.mkdir("/x", 0o777), Err(Errno::EEXIST));
        b.mkdir("/x/y", 0o777).unwrap();
        assert!(a.getattr("/x/y").unwrap().is_dir());

        assert_eq!(handle.join().unwrap(), 4);
        assert!(mock.exists("/x/y"));
    }

    #[test]
    fn test_unknown_client_is_dropped() {
        let channel = MemoryChannel::new(4, 2);
        let mut server = MetadataServer::new(channel.server(), MockClient::new(), 1);
        let stranger = channel.client(1).unwrap();
        stranger
            .send_request(&MDRequest::new(OperationKind::MakeDir, "/s", 0o777, 1).unwrap())
            .unwrap();

        server.serve_one().unwrap();
        assert_eq!(server.dropped(), 1);
        assert_eq!(server.handled(), 0);
    }

    #[test]
    fn test_serve_forever_stops_on_disconnect() {
        let channel = MemoryChannel::new(4, 1);
        let client = channel.client(0).unwrap();
        let mock = MockClient::new();
        let mut server = MetadataServer::new(channel.server(), mock.clone(), 1);
        client
            .send_request(&MDRequest::new(OperationKind::MakeDir, "/a", 0o777, 0).unwrap())
            .unwrap();
        drop(client);
        drop(channel);

        // The queued request is still performed before the loop ends
        server.serve_forever().unwrap();
        assert!(mock.exists("/a"));
    }

    /// Replays a fixed sequence of receive results
    struct ScriptedTransport {
        incoming: Mutex<VecDeque<std::result::Result<MDRequest, ChannelError>>>,
        replies: Mutex<Vec<(u64, MDResponse)>>,
    }

    impl ServerTransport for ScriptedTransport {
        fn recv_request(&self) -> std::result::Result<MDRequest, ChannelError> {
            self.incoming
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ChannelError::Disconnected))
        }

        fn send_response(&self, client_id: u64, response: &MDResponse) -> std::result::Result<(), ChannelError> {
            self.replies.lock().unwrap().push((client_id, *response));
            Ok(())
        }
    }

    #[test]
    fn test_malformed_record_does_not_stop_server() {
        let mut frame = MDRequest::new(OperationKind::MakeDir, "/bad", 0o777, 0).unwrap().encode();
        frame[0..4].copy_from_slice(&9u32.to_le_bytes());
        let bad = MDRequest::decode(&frame).map_err(ChannelError::from);
        assert!(bad.is_err());

        let good = MDRequest::new(OperationKind::MakeDir, "/good", 0o777, 0).unwrap();
        let transport = ScriptedTransport {
            incoming: Mutex::new(VecDeque::from(vec![bad, Ok(good)])),
            replies: Mutex::new(Vec::new()),
        };
        let mock = MockClient::new();
        let mut server = MetadataServer::new(transport, mock.clone(), 1);

        server.serve_forever().unwrap();
        assert_eq!(server.dropped(), 1);
        assert_eq!(server.handled(), 1);
        assert!(mock.exists("/good"));
        assert!(!mock.exists("/bad"));

        let replies = server.transport.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0], (0, MDResponse::with_result(0)));
    }
}
