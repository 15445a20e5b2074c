use std::io;

use crate::ids::ConnectionId;
use crate::packet::StrestResponse;

/// The transport half of a physical connection.
///
/// Socket handling and wire framing live behind this trait; the framework
/// only needs to write responses, ask whether the connection is still open,
/// and close it.
pub trait Transport: Send + Sync {
    /// Identity used to key per-connection state.
    fn id(&self) -> ConnectionId;

    /// Whether the underlying connection can still be written to.
    fn is_open(&self) -> bool;

    /// Write one response. Returns once the write has completed or failed.
    fn write(&self, response: &StrestResponse) -> io::Result<()>;

    /// Close the underlying connection. Must be idempotent.
    fn close(&self);
}

/// Outcome of a completed write.
#[derive(Debug)]
pub struct WriteAck {
    result: io::Result<()>,
}

impl WriteAck {
    pub(crate) fn new(result: io::Result<()>) -> Self {
        Self { result }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    #[must_use]
    pub fn error(&self) -> Option<&io::Error> {
        self.result.as_ref().err()
    }
}
