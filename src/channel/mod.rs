//! Request channel between the interception shim and the metadata handler
//!
//! The channel is one shared request queue that every client enqueues on,
//! plus one response queue per client id. Responses are routed purely by the
//! queue name, so the payload carries no correlation id beyond `client_id`,
//! and each client must drain its response before issuing another request.
//!
//! # Transports
//!
//! - **mqueue**: POSIX message queues (Linux), for separate processes
//! - **memory**: bounded crossbeam channels, for in-process use and tests
//!
//! Both carry the encoded fixed-size records from [`crate::protocol`], so the
//! wire layout is exercised by every transport.

use crate::protocol::{MDRequest, MDResponse, WireError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
#[cfg(target_os = "linux")]
pub mod mqueue;

/// Errors raised by channel transports
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to open queue {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("queue {name} carries {actual}-byte messages, expected {expected}")]
    MessageSize {
        name: String,
        actual: usize,
        expected: usize,
    },

    #[error("client id {client_id} has no response queue (max clients {max_clients})")]
    UnknownClient { client_id: u64, max_clients: usize },

    #[error("channel disconnected")]
    Disconnected,

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Queue names shared by both ends of the channel
///
/// Response queues are named `<response_prefix><client_id>`, so the handler
/// can route a response without any other coordination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelNames {
    pub request: String,
    pub response_prefix: String,
}

impl ChannelNames {
    pub fn new(request: impl Into<String>, response_prefix: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response_prefix: response_prefix.into(),
        }
    }

    /// Name of the response queue owned by `client_id`
    pub fn response(&self, client_id: u64) -> String {
        format!("{}{}", self.response_prefix, client_id)
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::new("/mdpulse_req_mq", "/mdpulse_resp_mq_")
    }
}

/// Client end: sends on the shared request queue, receives on its own queue
pub trait ClientTransport: Send {
    /// Enqueue a request, blocking while the request queue is full
    fn send_request(&self, request: &MDRequest) -> Result<(), ChannelError>;

    /// Block until the next response for this client arrives
    fn recv_response(&self) -> Result<MDResponse, ChannelError>;

    /// Client id whose response queue this end reads
    fn client_id(&self) -> u64;

    /// Send a request and wait for its response
    fn call(&self, request: &MDRequest) -> Result<MDResponse, ChannelError> {
        self.send_request(request)?;
        self.recv_response()
    }
}

/// Handler end: receives from the shared queue, replies per client
pub trait ServerTransport: Send {
    /// Block until the next request arrives from any client
    fn recv_request(&self) -> Result<MDRequest, ChannelError>;

    /// Enqueue a response on `client_id`'s queue, blocking while it is full
    fn send_response(&self, client_id: u64, response: &MDResponse) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_names_are_deterministic() {
        let names = ChannelNames::default();
        assert_eq!(names.response(0), "/mdpulse_resp_mq_0");
        assert_eq!(names.response(17), "/mdpulse_resp_mq_17");
    }
}
