use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::transport::Transport;
use crate::ids::ConnectionId;
use crate::packet::StrestResponse;

/// In-process transport that records every response written to it.
///
/// Used by the `strest` binary to run requests without a socket, and by
/// tests to observe what the dispatcher sent and whether it closed the
/// connection.
#[derive(Debug)]
pub struct MemoryTransport {
    id: ConnectionId,
    open: AtomicBool,
    fail_writes: AtomicBool,
    close_calls: AtomicUsize,
    sent: Mutex<Vec<StrestResponse>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ConnectionId::next(),
            open: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every response written so far.
    #[must_use]
    pub fn sent(&self) -> Vec<StrestResponse> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Simulate the peer going away without a `close` from our side.
    pub fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with `BrokenPipe` while staying open.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// How many times `close` has been called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn write(&self, response: &StrestResponse) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "transport closed"));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(response.clone());
        Ok(())
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}
