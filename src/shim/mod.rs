//! Filesystem call interception
//!
//! A [`Shim`] sits between an unmodified application and libc. Paths under
//! the mount prefix are stripped of it and forwarded to the remote metadata
//! handler as one [`MDRequest`] each; the handler's result code is returned
//! to the caller unchanged. Every other path goes to the [`Fallback`], which
//! in a preloaded library is the original libc implementation.
//!
//! Intercepted calls: mkdir, rmdir, creat, unlink, stat and mknod (mknod is
//! forwarded as Create).
//!
//! # Example
//!
//! ```
//! use mdpulse::shim::MountPrefix;
//!
//! let prefix = MountPrefix::new("/ethane");
//! assert_eq!(prefix.strip("/ethane/foo"), Some("/foo"));
//! assert_eq!(prefix.strip("/ethane"), Some("/"));
//! assert_eq!(prefix.strip("/ethanex/foo"), None);
//! ```

#[cfg(feature = "preload")]
pub mod preload;

use crate::channel::ClientTransport;
use crate::client::{Errno, OperationKind};
use crate::protocol::{MDRequest, MDResponse, WireError};
use std::ffi::CStr;
use std::os::raw::c_int;
use std::sync::Mutex;
use tracing::warn;

/// Mount prefix used when none is configured
pub const DEFAULT_MOUNT: &str = "/ethane";

/// Path prefix that marks a call as belonging to the managed filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPrefix(String);

impl MountPrefix {
    /// Build a prefix; trailing slashes are ignored
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Managed path relative to the mount, `None` when `path` is outside it
    ///
    /// A path is under the prefix when it equals it or continues with '/'
    /// right after it. The bare prefix maps to "/".
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        match self.strip_bytes(path.as_bytes())? {
            b"" => Some("/"),
            _ => Some(&path[self.0.len()..]),
        }
    }

    fn strip_bytes<'a>(&self, path: &'a [u8]) -> Option<&'a [u8]> {
        let rest = path.strip_prefix(self.0.as_bytes())?;
        if rest.is_empty() || rest[0] == b'/' {
            Some(rest)
        } else {
            None
        }
    }
}

impl Default for MountPrefix {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT)
    }
}

/// Implementations used for paths outside the mount prefix
///
/// Results follow the libc convention of the call being replaced.
pub trait Fallback: Send + Sync {
    fn mkdir(&self, path: &CStr, mode: libc::mode_t) -> c_int;
    fn rmdir(&self, path: &CStr) -> c_int;
    fn creat(&self, path: &CStr, mode: libc::mode_t) -> c_int;
    fn unlink(&self, path: &CStr) -> c_int;
    fn stat(&self, path: &CStr, buf: &mut libc::stat) -> c_int;
    fn mknod(&self, path: &CStr, mode: libc::mode_t, dev: libc::dev_t) -> c_int;
}

enum Route<'a> {
    Managed(&'a str),
    Invalid,
    Passthrough,
}

/// Mount-prefix dispatcher for the intercepted calls
///
/// One shim owns one client id and so one response queue. Threads sharing a
/// shim take turns: a request and its response form one exchange under
/// `exchange`, so each caller drains its own reply before the next request
/// is sent.
pub struct Shim<T: ClientTransport, F: Fallback> {
    prefix: MountPrefix,
    transport: T,
    fallback: F,
    exchange: Mutex<()>,
}

impl<T: ClientTransport, F: Fallback> Shim<T, F> {
    pub fn new(prefix: MountPrefix, transport: T, fallback: F) -> Self {
        Self {
            prefix,
            transport,
            fallback,
            exchange: Mutex::new(()),
        }
    }

    pub fn prefix(&self) -> &MountPrefix {
        &self.prefix
    }

    pub fn client_id(&self) -> u64 {
        self.transport.client_id()
    }

    /// Whether `path` falls under the mount prefix
    pub fn is_managed(&self, path: &CStr) -> bool {
        self.prefix.strip_bytes(path.to_bytes()).is_some()
    }

    pub fn mkdir(&self, path: &CStr, mode: libc::mode_t) -> c_int {
        match self.route(path) {
            Route::Managed(rel) => self.forward(OperationKind::MakeDir, rel, mode as u32).result,
            Route::Invalid => Errno::EINVAL.to_result_code(),
            Route::Passthrough => self.fallback.mkdir(path, mode),
        }
    }

    pub fn rmdir(&self, path: &CStr) -> c_int {
        match self.route(path) {
            Route::Managed(rel) => self.forward(OperationKind::RemoveDir, rel, 0).result,
            Route::Invalid => Errno::EINVAL.to_result_code(),
            Route::Passthrough => self.fallback.rmdir(path),
        }
    }

    pub fn creat(&self, path: &CStr, mode: libc::mode_t) -> c_int {
        match self.route(path) {
            Route::Managed(rel) => self.forward(OperationKind::Create, rel, mode as u32).result,
            Route::Invalid => Errno::EINVAL.to_result_code(),
            Route::Passthrough => self.fallback.creat(path, mode),
        }
    }

    pub fn unlink(&self, path: &CStr) -> c_int {
        match self.route(path) {
            Route::Managed(rel) => self.forward(OperationKind::Unlink, rel, 0).result,
            Route::Invalid => Errno::EINVAL.to_result_code(),
            Route::Passthrough => self.fallback.unlink(path),
        }
    }

    /// Forwarded stats copy the attributes into `buf` on success
    pub fn stat(&self, path: &CStr, buf: &mut libc::stat) -> c_int {
        match self.route(path) {
            Route::Managed(rel) => {
                let response = self.forward(OperationKind::Stat, rel, 0);
                if response.result == 0 {
                    response.stat.write_to(buf);
                }
                response.result
            }
            Route::Invalid => Errno::EINVAL.to_result_code(),
            Route::Passthrough => self.fallback.stat(path, buf),
        }
    }

    /// Managed paths become a Create; the device number is dropped
    pub fn mknod(&self, path: &CStr, mode: libc::mode_t, dev: libc::dev_t) -> c_int {
        match self.route(path) {
            Route::Managed(rel) => self.forward(OperationKind::Create, rel, mode as u32).result,
            Route::Invalid => Errno::EINVAL.to_result_code(),
            Route::Passthrough => self.fallback.mknod(path, mode, dev),
        }
    }

    fn route<'a>(&self, path: &'a CStr) -> Route<'a> {
        let Some(rest) = self.prefix.strip_bytes(path.to_bytes()) else {
            return Route::Passthrough;
        };
        match std::str::from_utf8(rest) {
            Ok("") => Route::Managed("/"),
            Ok(rel) => Route::Managed(rel),
            Err(_) => Route::Invalid,
        }
    }

    /// One request, one response; failures become a result code
    fn forward(&self, op: OperationKind, rel: &str, mode: u32) -> MDResponse {
        let request = match MDRequest::new(op, rel, mode, self.transport.client_id()) {
            Ok(request) => request,
            Err(WireError::PathTooLong { .. }) => return MDResponse::with_result(Errno::ENAMETOOLONG.to_result_code()),
            Err(_) => return MDResponse::with_result(Errno::EINVAL.to_result_code()),
        };
        let result = {
            // The guard protects no data, so a poisoned lock is still usable
            let _turn = self.exchange.lock().unwrap_or_else(|e| e.into_inner());
            self.transport.call(&request)
        };
        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(op = %op, path = rel, error = %e, "request channel failed");
                MDResponse::with_result(Errno::EIO.to_result_code())
            }
        }
    }
}
