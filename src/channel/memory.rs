//! In-process request channel
//!
//! Bounded crossbeam channels stand in for the named queues: one shared
//! request channel and one response channel per client id, created up front
//! for `max_clients` clients. Frames are the encoded wire records.

use super::{ChannelError, ClientTransport, ServerTransport};
use crate::protocol::{MDRequest, MDResponse};
use crossbeam::channel::{bounded, Receiver, Sender};

type Frame = Vec<u8>;

/// Factory holding every queue of an in-process channel
pub struct MemoryChannel {
    request_tx: Sender<Frame>,
    request_rx: Receiver<Frame>,
    response_tx: Vec<Sender<Frame>>,
    response_rx: Vec<Receiver<Frame>>,
}

impl MemoryChannel {
    /// Create a channel with `capacity` slots per queue for `max_clients` clients
    pub fn new(capacity: usize, max_clients: usize) -> Self {
        let (request_tx, request_rx) = bounded(capacity);
        let (response_tx, response_rx): (Vec<_>, Vec<_>) =
            (0..max_clients).map(|_| bounded::<Frame>(capacity)).unzip();
        Self {
            request_tx,
            request_rx,
            response_tx,
            response_rx,
        }
    }

    /// Client end for `client_id`
    pub fn client(&self, client_id: u64) -> Result<MemoryClient, ChannelError> {
        let response_rx = self
            .response_rx
            .get(client_id as usize)
            .ok_or(ChannelError::UnknownClient {
                client_id,
                max_clients: self.response_rx.len(),
            })?
            .clone();
        Ok(MemoryClient {
            client_id,
            request_tx: self.request_tx.clone(),
            response_rx,
        })
    }

    /// Handler end
    pub fn server(&self) -> MemoryServer {
        MemoryServer {
            request_rx: self.request_rx.clone(),
            response_tx: self.response_tx.clone(),
        }
    }
}

/// Client end of a [`MemoryChannel`]
pub struct MemoryClient {
    client_id: u64,
    request_tx: Sender<Frame>,
    response_rx: Receiver<Frame>,
}

impl ClientTransport for MemoryClient {
    fn send_request(&self, request: &MDRequest) -> Result<(), ChannelError> {
        self.request_tx
            .send(request.encode().to_vec())
            .map_err(|_| ChannelError::Disconnected)
    }

    fn recv_response(&self) -> Result<MDResponse, ChannelError> {
        let frame = self.response_rx.recv().map_err(|_| ChannelError::Disconnected)?;
        Ok(MDResponse::decode(&frame)?)
    }

    fn client_id(&self) -> u64 {
        self.client_id
    }
}

/// Handler end of a [`MemoryChannel`]
pub struct MemoryServer {
    request_rx: Receiver<Frame>,
    response_tx: Vec<Sender<Frame>>,
}

impl MemoryServer {
    /// Number of requests waiting in the shared queue
    pub fn pending(&self) -> usize {
        self.request_rx.len()
    }

    /// Receive a request without blocking, if one is queued
    pub fn try_recv_request(&self) -> Result<Option<MDRequest>, ChannelError> {
        match self.request_rx.try_recv() {
            Ok(frame) => Ok(Some(MDRequest::decode(&frame)?)),
            Err(crossbeam::channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam::channel::TryRecvError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }
}

impl ServerTransport for MemoryServer {
    fn recv_request(&self) -> Result<MDRequest, ChannelError> {
        let frame = self.request_rx.recv().map_err(|_| ChannelError::Disconnected)?;
        Ok(MDRequest::decode(&frame)?)
    }

    fn send_response(&self, client_id: u64, response: &MDResponse) -> Result<(), ChannelError> {
        let tx = self
            .response_tx
            .get(client_id as usize)
            .ok_or(ChannelError::UnknownClient {
                client_id,
                max_clients: self.response_tx.len(),
            })?;
        tx.send(response.encode().to_vec())
            .map_err(|_| ChannelError::Disconnected)
    }
}
