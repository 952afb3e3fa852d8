//! C ABI exports for `LD_PRELOAD`
//!
//! Built with the `preload` feature, the cdylib exports `mkdir`, `rmdir`,
//! `creat`, `unlink`, `stat` and `mknod`. Each export routes through one
//! process-wide [`Shim`] over POSIX message queues, built on first use.
//!
//! # Environment
//!
//! - `OMPI_COMM_WORLD_NODE_RANK`: client id (default 0)
//! - `MDPULSE_MOUNT`: mount prefix (default `/ethane`)
//! - `MDPULSE_REQUEST_QUEUE`, `MDPULSE_RESPONSE_PREFIX`: queue names
//!
//! If the queues cannot be opened the process exits with status 255.
//!
//! # Lifetime
//!
//! The connection is opened lazily by the first intercepted call of any
//! kind, including calls for paths outside the mount, rather than when the
//! library is loaded. No unload hook is registered: the queue descriptors
//! stay open until process exit, where the kernel closes them. The server
//! owns the queues and unlinks them.
//!
//! # Return values
//!
//! Forwarded calls return the handler's result code (0 or a negative
//! errno). Calls for other paths follow the libc convention of -1 with
//! `errno` set.

use super::{Fallback, MountPrefix, Shim, DEFAULT_MOUNT};
use crate::channel::mqueue::MqClient;
use crate::channel::ChannelNames;
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::sync::OnceLock;

type MkdirFn = unsafe extern "C" fn(*const c_char, libc::mode_t) -> c_int;
type PathFn = unsafe extern "C" fn(*const c_char) -> c_int;
type StatFn = unsafe extern "C" fn(*const c_char, *mut libc::stat) -> c_int;
type MknodFn = unsafe extern "C" fn(*const c_char, libc::mode_t, libc::dev_t) -> c_int;

static LIBC_MKDIR: OnceLock<Option<MkdirFn>> = OnceLock::new();
static LIBC_RMDIR: OnceLock<Option<PathFn>> = OnceLock::new();
static LIBC_CREAT: OnceLock<Option<MkdirFn>> = OnceLock::new();
static LIBC_UNLINK: OnceLock<Option<PathFn>> = OnceLock::new();
static LIBC_STAT: OnceLock<Option<StatFn>> = OnceLock::new();
static LIBC_MKNOD: OnceLock<Option<MknodFn>> = OnceLock::new();

static SHIM: OnceLock<Shim<MqClient, LibcFallback>> = OnceLock::new();

/// Look up the next definition of `name` once and memoize it
///
/// `name` must be NUL-terminated and `F` a function pointer type matching
/// the C signature of the symbol.
fn original<F: Copy>(cell: &OnceLock<Option<F>>, name: &'static [u8]) -> Option<F> {
    *cell.get_or_init(|| {
        // SAFETY: name is NUL-terminated; RTLD_NEXT skips this library
        let sym = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr() as *const c_char) };
        if sym.is_null() {
            None
        } else {
            // SAFETY: F is a function pointer of the symbol's C signature
            Some(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&sym) })
        }
    })
}

/// Fail in the libc way: set `errno`, return -1
fn fail_with(code: c_int) -> c_int {
    // SAFETY: errno is thread-local
    unsafe { *libc::__errno_location() = code };
    -1
}

fn missing() -> c_int {
    fail_with(libc::ENOSYS)
}

/// Result of `stat` with a null buffer
///
/// Managed paths answer like a forwarded call; others like libc.
fn null_buffer_stat(managed: bool) -> c_int {
    if managed {
        -libc::EFAULT
    } else {
        fail_with(libc::EFAULT)
    }
}

/// Original libc implementations, resolved with `dlsym(RTLD_NEXT)`
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcFallback;

impl Fallback for LibcFallback {
    fn mkdir(&self, path: &CStr, mode: libc::mode_t) -> c_int {
        match original(&LIBC_MKDIR, b"mkdir\0") {
            Some(f) => unsafe { f(path.as_ptr(), mode) },
            None => missing(),
        }
    }

    fn rmdir(&self, path: &CStr) -> c_int {
        match original(&LIBC_RMDIR, b"rmdir\0") {
            Some(f) => unsafe { f(path.as_ptr()) },
            None => missing(),
        }
    }

    fn creat(&self, path: &CStr, mode: libc::mode_t) -> c_int {
        match original(&LIBC_CREAT, b"creat\0") {
            Some(f) => unsafe { f(path.as_ptr(), mode) },
            None => missing(),
        }
    }

    fn unlink(&self, path: &CStr) -> c_int {
        match original(&LIBC_UNLINK, b"unlink\0") {
            Some(f) => unsafe { f(path.as_ptr()) },
            None => missing(),
        }
    }

    fn stat(&self, path: &CStr, buf: &mut libc::stat) -> c_int {
        match original(&LIBC_STAT, b"stat\0") {
            Some(f) => unsafe { f(path.as_ptr(), buf) },
            None => missing(),
        }
    }

    fn mknod(&self, path: &CStr, mode: libc::mode_t, dev: libc::dev_t) -> c_int {
        match original(&LIBC_MKNOD, b"mknod\0") {
            Some(f) => unsafe { f(path.as_ptr(), mode, dev) },
            None => missing(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn connect() -> Shim<MqClient, LibcFallback> {
    let client_id = std::env::var("OMPI_COMM_WORLD_NODE_RANK")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let defaults = ChannelNames::default();
    let names = ChannelNames::new(
        env_or("MDPULSE_REQUEST_QUEUE", &defaults.request),
        env_or("MDPULSE_RESPONSE_PREFIX", &defaults.response_prefix),
    );
    let prefix = MountPrefix::new(env_or("MDPULSE_MOUNT", DEFAULT_MOUNT));

    match MqClient::connect(&names, client_id) {
        Ok(transport) => Shim::new(prefix, transport, LibcFallback),
        Err(e) => {
            eprintln!("mdpulse preload: failed to open request channel for client {}: {}", client_id, e);
            std::process::exit(255);
        }
    }
}

fn shim() -> &'static Shim<MqClient, LibcFallback> {
    SHIM.get_or_init(connect)
}

/// # Safety
///
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mkdir(path: *const c_char, mode: libc::mode_t) -> c_int {
    shim().mkdir(CStr::from_ptr(path), mode)
}

/// # Safety
///
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn rmdir(path: *const c_char) -> c_int {
    shim().rmdir(CStr::from_ptr(path))
}

/// # Safety
///
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn creat(path: *const c_char, mode: libc::mode_t) -> c_int {
    shim().creat(CStr::from_ptr(path), mode)
}

/// # Safety
///
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn unlink(path: *const c_char) -> c_int {
    shim().unlink(CStr::from_ptr(path))
}

/// # Safety
///
/// `path` must be a valid NUL-terminated string and `buf` valid for writes.
#[no_mangle]
pub unsafe extern "C" fn stat(path: *const c_char, buf: *mut libc::stat) -> c_int {
    let path = CStr::from_ptr(path);
    match buf.as_mut() {
        Some(buf) => shim().stat(path, buf),
        None => null_buffer_stat(shim().is_managed(path)),
    }
}

/// # Safety
///
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mknod(path: *const c_char, mode: libc::mode_t, dev: libc::dev_t) -> c_int {
    shim().mknod(CStr::from_ptr(path), mode, dev)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errno() -> c_int {
        // SAFETY: errno is thread-local
        unsafe { *libc::__errno_location() }
    }

    #[test]
    fn test_null_buffer_stat() {
        assert_eq!(null_buffer_stat(true), -libc::EFAULT);

        assert_eq!(null_buffer_stat(false), -1);
        assert_eq!(errno(), libc::EFAULT);
    }

    #[test]
    fn test_missing_sets_enosys() {
        assert_eq!(missing(), -1);
        assert_eq!(errno(), libc::ENOSYS);
    }
}
