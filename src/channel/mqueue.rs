//! POSIX message queue transport
//!
//! Queue capacity and message size are fixed when the handler creates the
//! queues; clients open the existing queues and verify that the message size
//! matches the record they will send or receive. Sends block while a queue is
//! full and receives block until a message arrives. Interrupted calls are
//! restarted; nothing else is retried.
//!
//! Linux limits unprivileged queues to `/proc/sys/fs/mqueue/msg_max`
//! messages (10 by default), so capacities above that need privileges.

use super::{ChannelError, ChannelNames, ClientTransport, ServerTransport};
use crate::protocol::{MDRequest, MDResponse, MD_REQUEST_SIZE, MD_RESPONSE_SIZE};
use std::ffi::CString;
use std::io;
use tracing::{debug, warn};

/// One open POSIX message queue
#[derive(Debug)]
pub struct MessageQueue {
    name: String,
    mqd: libc::mqd_t,
    msg_size: usize,
}

fn c_name(name: &str) -> Result<CString, ChannelError> {
    CString::new(name).map_err(|_| ChannelError::Open {
        name: name.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "queue name contains NUL"),
    })
}

impl MessageQueue {
    /// Create a queue, replacing any stale queue with the same name
    pub fn create(name: &str, capacity: usize, msg_size: usize) -> Result<Self, ChannelError> {
        let cname = c_name(name)?;
        // A leftover queue from a previous run may have different attributes
        unsafe { libc::mq_unlink(cname.as_ptr()) };

        // SAFETY: mq_attr is plain old data
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        attr.mq_maxmsg = capacity as libc::c_long;
        attr.mq_msgsize = msg_size as libc::c_long;

        let mqd = unsafe {
            libc::mq_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o666 as libc::mode_t,
                &mut attr as *mut libc::mq_attr,
            )
        };
        if mqd == -1 {
            return Err(ChannelError::Open {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        debug!(queue = name, capacity, msg_size, "created message queue");
        Ok(Self {
            name: name.to_string(),
            mqd,
            msg_size,
        })
    }

    /// Open an existing queue and check its message size
    pub fn open(name: &str, msg_size: usize) -> Result<Self, ChannelError> {
        let cname = c_name(name)?;
        let mqd = unsafe { libc::mq_open(cname.as_ptr(), libc::O_RDWR) };
        if mqd == -1 {
            return Err(ChannelError::Open {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        let queue = Self {
            name: name.to_string(),
            mqd,
            msg_size,
        };

        let actual = queue.attr_msg_size().map_err(|source| ChannelError::Open {
            name: name.to_string(),
            source,
        })?;
        if actual != msg_size {
            return Err(ChannelError::MessageSize {
                name: name.to_string(),
                actual,
                expected: msg_size,
            });
        }
        Ok(queue)
    }

    /// Remove a queue name from the system
    pub fn unlink(name: &str) -> io::Result<()> {
        let cname = CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        if unsafe { libc::mq_unlink(cname.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn attr_msg_size(&self) -> io::Result<usize> {
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        if unsafe { libc::mq_getattr(self.mqd, &mut attr) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(attr.mq_msgsize as usize)
    }

    /// Enqueue one message, blocking while the queue is full
    pub fn send(&self, msg: &[u8]) -> Result<(), ChannelError> {
        debug_assert_eq!(msg.len(), self.msg_size);
        loop {
            let rc = unsafe {
                libc::mq_send(self.mqd, msg.as_ptr() as *const libc::c_char, msg.len(), 0)
            };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(ChannelError::Send(err));
            }
        }
    }

    /// Dequeue one message into `buf`, blocking until one arrives
    ///
    /// `buf` must be at least the queue's message size.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize, ChannelError> {
        loop {
            let n = unsafe {
                libc::mq_receive(
                    self.mqd,
                    buf.as_mut_ptr() as *mut libc::c_char,
                    buf.len(),
                    std::ptr::null_mut(),
                )
            };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(ChannelError::Receive(err));
            }
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        unsafe { libc::mq_close(self.mqd) };
    }
}

/// Client end over POSIX message queues
#[derive(Debug)]
pub struct MqClient {
    client_id: u64,
    request: MessageQueue,
    response: MessageQueue,
}

impl MqClient {
    /// Open the shared request queue and this client's response queue
    pub fn connect(names: &ChannelNames, client_id: u64) -> Result<Self, ChannelError> {
        let request = MessageQueue::open(&names.request, MD_REQUEST_SIZE)?;
        let response = MessageQueue::open(&names.response(client_id), MD_RESPONSE_SIZE)?;
        Ok(Self {
            client_id,
            request,
            response,
        })
    }
}

impl ClientTransport for MqClient {
    fn send_request(&self, request: &MDRequest) -> Result<(), ChannelError> {
        self.request.send(&request.encode())
    }

    fn recv_response(&self) -> Result<MDResponse, ChannelError> {
        let mut buf = [0u8; MD_RESPONSE_SIZE];
        let n = self.response.receive(&mut buf)?;
        Ok(MDResponse::decode(&buf[..n])?)
    }

    fn client_id(&self) -> u64 {
        self.client_id
    }
}

/// Handler end over POSIX message queues
///
/// Owns the queue names: it creates every queue and unlinks them on drop.
#[derive(Debug)]
pub struct MqServer {
    request: MessageQueue,
    responses: Vec<MessageQueue>,
}

impl MqServer {
    /// Create the request queue and `max_clients` response queues
    pub fn create(
        names: &ChannelNames,
        request_capacity: usize,
        response_capacity: usize,
        max_clients: usize,
    ) -> Result<Self, ChannelError> {
        let request = MessageQueue::create(&names.request, request_capacity, MD_REQUEST_SIZE)?;
        let responses = (0..max_clients as u64)
            .map(|id| MessageQueue::create(&names.response(id), response_capacity, MD_RESPONSE_SIZE))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { request, responses })
    }
}

impl ServerTransport for MqServer {
    fn recv_request(&self) -> Result<MDRequest, ChannelError> {
        let mut buf = [0u8; MD_REQUEST_SIZE];
        let n = self.request.receive(&mut buf)?;
        Ok(MDRequest::decode(&buf[..n])?)
    }

    fn send_response(&self, client_id: u64, response: &MDResponse) -> Result<(), ChannelError> {
        let queue = self
            .responses
            .get(client_id as usize)
            .ok_or(ChannelError::UnknownClient {
                client_id,
                max_clients: self.responses.len(),
            })?;
        queue.send(&response.encode())
    }
}

impl Drop for MqServer {
    fn drop(&mut self) {
        for queue in std::iter::once(&self.request).chain(self.responses.iter()) {
            if let Err(e) = MessageQueue::unlink(queue.name()) {
                warn!(queue = queue.name(), error = %e, "failed to unlink message queue");
            }
        }
    }
}
