//! Intercepted calls travel through the request channel to a live handler

use mdpulse::channel::memory::MemoryChannel;
use mdpulse::client::mock::{CallKind, ClientCall, MockClient};
use mdpulse::client::OperationKind;
use mdpulse::server::MetadataServer;
use mdpulse::shim::{Fallback, MountPrefix, Shim};
use std::ffi::{c_int, CStr, CString};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone, Default)]
struct CountingFallback {
    paths: Arc<Mutex<Vec<String>>>,
}

impl CountingFallback {
    fn record(&self, path: &CStr) -> c_int {
        self.paths.lock().unwrap().push(path.to_string_lossy().into_owned());
        0
    }

    fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl Fallback for CountingFallback {
    fn mkdir(&self, path: &CStr, _mode: libc::mode_t) -> c_int {
        self.record(path)
    }
    fn rmdir(&self, path: &CStr) -> c_int {
        self.record(path)
    }
    fn creat(&self, path: &CStr, _mode: libc::mode_t) -> c_int {
        self.record(path)
    }
    fn unlink(&self, path: &CStr) -> c_int {
        self.record(path)
    }
    fn stat(&self, path: &CStr, _buf: &mut libc::stat) -> c_int {
        self.record(path)
    }
    fn mknod(&self, path: &CStr, _mode: libc::mode_t, _dev: libc::dev_t) -> c_int {
        self.record(path)
    }
}

fn c(path: &str) -> CString {
    CString::new(path).unwrap()
}

/// Start a handler thread that answers exactly `n` requests
fn spawn_server(channel: &MemoryChannel, mock: &MockClient, n: u64) -> thread::JoinHandle<(u64, u64)> {
    let mut server = MetadataServer::new(channel.server(), mock.clone(), 4);
    thread::spawn(move || {
        server.serve_n(n).unwrap();
        (server.handled(), server.dropped())
    })
}

#[test]
fn test_managed_mkdir_reaches_handler() {
    let channel = MemoryChannel::new(10, 4);
    let mock = MockClient::new();
    let server = spawn_server(&channel, &mock, 1);
    let fallback = CountingFallback::default();
    let shim = Shim::new(MountPrefix::new("/ethane"), channel.client(0).unwrap(), fallback.clone());

    assert_eq!(shim.mkdir(&c("/ethane/foo"), 0o777), 0);
    assert_eq!(server.join().unwrap(), (1, 0));

    assert_eq!(
        mock.calls(),
        vec![ClientCall {
            kind: CallKind::Metadata(OperationKind::MakeDir),
            path: "/foo".to_string(),
        }]
    );
    assert!(fallback.paths().is_empty());
}

#[test]
fn test_unmanaged_paths_never_touch_channel() {
    let channel = MemoryChannel::new(10, 4);
    let fallback = CountingFallback::default();
    let shim = Shim::new(MountPrefix::new("/ethane"), channel.client(0).unwrap(), fallback.clone());

    assert_eq!(shim.mkdir(&c("/tmp/foo"), 0o755), 0);
    assert_eq!(shim.unlink(&c("/ethanefoo")), 0);
    assert_eq!(fallback.paths(), vec!["/tmp/foo".to_string(), "/ethanefoo".to_string()]);
    assert_eq!(channel.server().pending(), 0);
}

#[test]
fn test_remote_results_are_returned_verbatim() {
    let channel = MemoryChannel::new(10, 4);
    let mock = MockClient::new();
    let server = spawn_server(&channel, &mock, 6);
    let shim = Shim::new(
        MountPrefix::new("/ethane"),
        channel.client(2).unwrap(),
        CountingFallback::default(),
    );

    assert_eq!(shim.mkdir(&c("/ethane/d"), 0o750), 0);
    assert_eq!(shim.mkdir(&c("/ethane/d"), 0o750), -libc::EEXIST);
    assert_eq!(shim.creat(&c("/ethane/d/f"), 0o644), 0);

    // SAFETY: libc::stat is plain old data; all-zero is a valid value
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    assert_eq!(shim.stat(&c("/ethane/d"), &mut st), 0);
    assert_eq!(st.st_mode as u32 & libc::S_IFMT as u32, libc::S_IFDIR as u32);
    assert_eq!(st.st_mode as u32 & 0o7777, 0o750);

    assert_eq!(shim.rmdir(&c("/ethane/d")), -libc::ENOTEMPTY);
    assert_eq!(shim.stat(&c("/ethane/missing"), &mut st), -libc::ENOENT);

    assert_eq!(server.join().unwrap(), (6, 0));
    assert!(mock.exists("/d/f"));
}

#[test]
fn test_concurrent_shims_get_their_own_responses() {
    let channel = MemoryChannel::new(10, 4);
    let mock = MockClient::new();
    let server = spawn_server(&channel, &mock, 4 * 25);

    let shims: Vec<_> = (0..4u64)
        .map(|id| {
            Shim::new(
                MountPrefix::new("/ethane"),
                channel.client(id).unwrap(),
                CountingFallback::default(),
            )
        })
        .collect();

    thread::scope(|s| {
        for (id, shim) in shims.iter().enumerate() {
            s.spawn(move || {
                for i in 0..25 {
                    let path = c(&format!("/ethane/c{}-{}", id, i));
                    assert_eq!(shim.mkdir(&path, 0o777), 0);
                }
            });
        }
    });

    assert_eq!(server.join().unwrap(), (100, 0));
    assert_eq!(mock.entry_count(), 100);
}
