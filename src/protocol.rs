//! Request/response wire records
//!
//! The request channel is a byte-oriented message transport, not a
//! self-describing one, so both ends must agree on the exact size and field
//! order of every record. Records are fixed-size and little-endian.
//!
//! # Layout
//!
//! ```text
//! MDRequest (528 bytes)
//!   [0..4)     op         u32   OperationKind discriminant
//!   [4..516)   path       [u8]  NUL-terminated within 512 bytes
//!   [516..520) mode       u32
//!   [520..528) client_id  u64
//!
//! MDResponse (96 bytes)
//!   [0..4)     result     i32   0 or negative errno
//!   [4..8)     padding
//!   [8..96)    stat       11 x 64-bit fields, valid only for Stat
//! ```

use crate::client::{FileStat, OperationKind};
use thiserror::Error;

/// Bytes reserved for the path field, including its NUL terminator
pub const MD_PATH_CAPACITY: usize = 512;

/// Longest path that fits on the wire
pub const MD_PATH_MAX: usize = MD_PATH_CAPACITY - 1;

/// Encoded size of [`MDRequest`]
pub const MD_REQUEST_SIZE: usize = 4 + MD_PATH_CAPACITY + 4 + 8;

/// Encoded size of [`MDResponse`]
pub const MD_RESPONSE_SIZE: usize = 8 + STAT_FIELDS * 8;

const STAT_FIELDS: usize = 11;
const PATH_OFFSET: usize = 4;
const MODE_OFFSET: usize = PATH_OFFSET + MD_PATH_CAPACITY;
const CLIENT_OFFSET: usize = MODE_OFFSET + 4;
const STAT_OFFSET: usize = 8;

/// Errors building or decoding wire records
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("path is {len} bytes, the wire limit is {max}")]
    PathTooLong { len: usize, max: usize },

    #[error("path contains an interior NUL byte")]
    InteriorNul,

    #[error("path is not NUL-terminated within {0} bytes")]
    Unterminated(usize),

    #[error("path is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown operation discriminant {0}")]
    UnknownOperation(u32),

    #[error("record is {actual} bytes, expected {expected}")]
    BadLength { actual: usize, expected: usize },
}

/// Check that a path can be carried in the request path field
pub fn check_path(path: &str) -> Result<(), WireError> {
    if path.len() > MD_PATH_MAX {
        return Err(WireError::PathTooLong {
            len: path.len(),
            max: MD_PATH_MAX,
        });
    }
    if path.as_bytes().contains(&0) {
        return Err(WireError::InteriorNul);
    }
    Ok(())
}

/// Metadata request sent by a client on the shared request queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MDRequest {
    op: OperationKind,
    path: String,
    mode: u32,
    client_id: u64,
}

impl MDRequest {
    /// Build a request, rejecting paths that do not fit the wire bound
    pub fn new(op: OperationKind, path: &str, mode: u32, client_id: u64) -> Result<Self, WireError> {
        check_path(path)?;
        Ok(Self {
            op,
            path: path.to_string(),
            mode,
            client_id,
        })
    }

    pub fn op(&self) -> OperationKind {
        self.op
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Encode into the fixed-size record
    pub fn encode(&self) -> [u8; MD_REQUEST_SIZE] {
        let mut buf = [0u8; MD_REQUEST_SIZE];
        buf[0..4].copy_from_slice(&self.op.to_wire().to_le_bytes());
        // Remaining path bytes stay zero, which terminates the string
        buf[PATH_OFFSET..PATH_OFFSET + self.path.len()].copy_from_slice(self.path.as_bytes());
        buf[MODE_OFFSET..MODE_OFFSET + 4].copy_from_slice(&self.mode.to_le_bytes());
        buf[CLIENT_OFFSET..CLIENT_OFFSET + 8].copy_from_slice(&self.client_id.to_le_bytes());
        buf
    }

    /// Decode a fixed-size record
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != MD_REQUEST_SIZE {
            return Err(WireError::BadLength {
                actual: buf.len(),
                expected: MD_REQUEST_SIZE,
            });
        }
        let raw_op = read_u32(buf, 0);
        let op = OperationKind::from_wire(raw_op).ok_or(WireError::UnknownOperation(raw_op))?;

        let field = &buf[PATH_OFFSET..MODE_OFFSET];
        let len = field
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::Unterminated(MD_PATH_CAPACITY))?;
        let path = std::str::from_utf8(&field[..len]).map_err(|_| WireError::InvalidUtf8)?;

        Ok(Self {
            op,
            path: path.to_string(),
            mode: read_u32(buf, MODE_OFFSET),
            client_id: read_u64(buf, CLIENT_OFFSET),
        })
    }
}

/// Metadata response sent by the handler on the client's response queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MDResponse {
    /// 0 on success, negative errno on failure
    pub result: i32,
    /// Attributes, meaningful only for Stat responses
    pub stat: FileStat,
}

impl MDResponse {
    /// Response carrying only a result code
    pub fn with_result(result: i32) -> Self {
        Self {
            result,
            stat: FileStat::default(),
        }
    }

    /// Encode into the fixed-size record
    pub fn encode(&self) -> [u8; MD_RESPONSE_SIZE] {
        let mut buf = [0u8; MD_RESPONSE_SIZE];
        buf[0..4].copy_from_slice(&self.result.to_le_bytes());
        let s = &self.stat;
        let fields: [u64; STAT_FIELDS] = [
            s.ino,
            s.mode as u64,
            s.nlink,
            s.uid as u64,
            s.gid as u64,
            s.size as u64,
            s.blksize as u64,
            s.blocks as u64,
            s.atime as u64,
            s.mtime as u64,
            s.ctime as u64,
        ];
        for (i, value) in fields.iter().enumerate() {
            let at = STAT_OFFSET + i * 8;
            buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
        }
        buf
    }

    /// Decode a fixed-size record
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != MD_RESPONSE_SIZE {
            return Err(WireError::BadLength {
                actual: buf.len(),
                expected: MD_RESPONSE_SIZE,
            });
        }
        let field = |i: usize| read_u64(buf, STAT_OFFSET + i * 8);
        Ok(Self {
            result: read_u32(buf, 0) as i32,
            stat: FileStat {
                ino: field(0),
                mode: field(1) as u32,
                nlink: field(2),
                uid: field(3) as u32,
                gid: field(4) as u32,
                size: field(5) as i64,
                blksize: field(6) as i64,
                blocks: field(7) as i64,
                atime: field(8) as i64,
                mtime: field(9) as i64,
                ctime: field(10) as i64,
            },
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(MD_REQUEST_SIZE, 528);
        assert_eq!(MD_RESPONSE_SIZE, 96);
    }

    #[test]
    fn test_request_layout() {
        let req = MDRequest::new(OperationKind::MakeDir, "/foo", 0o777, 3).unwrap();
        let buf = req.encode();

        assert_eq!(&buf[0..4], &0u32.to_le_bytes());
        assert_eq!(&buf[4..8], b"/foo");
        assert_eq!(buf[8], 0);
        assert_eq!(&buf[516..520], &0o777u32.to_le_bytes());
        assert_eq!(&buf[520..528], &3u64.to_le_bytes());

        assert_eq!(MDRequest::decode(&buf).unwrap(), req);
    }

    #[test]
    fn test_request_path_bound() {
        let longest = format!("/{}", "a".repeat(MD_PATH_MAX - 1));
        let req = MDRequest::new(OperationKind::Stat, &longest, 0, 0).unwrap();
        let buf = req.encode();
        // Terminator is the last byte of the field
        assert_eq!(buf[MODE_OFFSET - 1], 0);
        assert_eq!(MDRequest::decode(&buf).unwrap().path(), longest);

        let too_long = format!("/{}", "a".repeat(MD_PATH_MAX));
        assert_eq!(
            MDRequest::new(OperationKind::Stat, &too_long, 0, 0),
            Err(WireError::PathTooLong { len: MD_PATH_MAX + 1, max: MD_PATH_MAX })
        );
    }

    #[test]
    fn test_request_rejects_interior_nul() {
        assert_eq!(
            MDRequest::new(OperationKind::Stat, "/a\0b", 0, 0),
            Err(WireError::InteriorNul)
        );
    }

    #[test]
    fn test_request_decode_errors() {
        assert!(matches!(MDRequest::decode(&[0u8; 10]), Err(WireError::BadLength { .. })));

        let mut buf = [0u8; MD_REQUEST_SIZE];
        buf[0..4].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(MDRequest::decode(&buf), Err(WireError::UnknownOperation(9)));

        let mut buf = [b'x'; MD_REQUEST_SIZE];
        buf[0..4].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(MDRequest::decode(&buf), Err(WireError::Unterminated(MD_PATH_CAPACITY)));
    }

    #[test]
    fn test_response_negative_result_and_stat() {
        let resp = MDResponse {
            result: -libc::ENOENT,
            stat: FileStat { ino: 11, mode: 0o40755, size: -1, mtime: 1_700_000_000, ..Default::default() },
        };
        let buf = resp.encode();
        assert_eq!(&buf[0..4], &(-libc::ENOENT).to_le_bytes());
        assert_eq!(MDResponse::decode(&buf).unwrap(), resp);
    }
}
