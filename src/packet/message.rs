use http::Method;
use std::ops::{Deref, DerefMut};

use super::core::{Packet, Protocol};
use super::txn::TxnStatus;

/// A raw inbound message as handed over by the transport.
///
/// Dereferences to its [`Packet`] for header, content and transaction access.
#[derive(Debug, Clone)]
pub struct StrestRequest {
    method: Method,
    uri: String,
    packet: Packet,
}

impl StrestRequest {
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            method,
            uri: uri.into(),
            packet: Packet::with_protocol(protocol),
        }
    }

    /// A native-protocol request (`STREST/0.1`).
    #[must_use]
    pub fn strest(method: Method, uri: impl Into<String>) -> Self {
        Self::new(method, uri, Protocol::strest())
    }

    /// A plain HTTP interop request (`HTTP/1.1`).
    #[must_use]
    pub fn http(method: Method, uri: impl Into<String>) -> Self {
        Self::new(method, uri, Protocol::http11())
    }

    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.packet.add_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.packet.set_content(content_type, body);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request target including any query string.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.split(['?', '#']).next().unwrap_or("/")
    }

    /// Raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        let (_, rest) = self.uri.split_once('?')?;
        Some(rest.split('#').next().unwrap_or(rest))
    }

    /// Whether the message uses the native protocol rather than HTTP interop.
    #[must_use]
    pub fn is_strest(&self) -> bool {
        self.packet.protocol().map_or(true, Protocol::is_strest)
    }

    #[must_use]
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

impl Deref for StrestRequest {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl DerefMut for StrestRequest {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

/// An outgoing response: status line plus packet.
#[derive(Debug, Clone)]
pub struct StrestResponse {
    status: u16,
    message: String,
    packet: Packet,
}

impl Default for StrestResponse {
    fn default() -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            packet: Packet::new(),
        }
    }
}

impl StrestResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a response belonging to `request`: same protocol, and for
    /// native STREST requests the request's transaction id.
    #[must_use]
    pub fn for_request(request: &StrestRequest) -> Self {
        let mut response = Self::default();
        if let Some(protocol) = request.protocol() {
            response.packet = Packet::with_protocol(protocol.clone());
        }
        if request.is_strest() {
            if let Some(txn_id) = request.txn_id() {
                response.packet.set_txn_id(txn_id);
            }
        }
        response
    }

    /// A `continue` response for an already-open transaction.
    #[must_use]
    pub fn partial(txn_id: Option<&str>) -> Self {
        let mut response = Self::default();
        if let Some(txn_id) = txn_id {
            response.packet.set_txn_id(txn_id);
        }
        response.packet.set_txn_status(TxnStatus::Continue);
        response
    }

    pub fn set_status(&mut self, code: u16, message: impl Into<String>) {
        self.status = code;
        self.message = message.into();
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn status_message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}

impl Deref for StrestResponse {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl DerefMut for StrestResponse {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.packet
    }
}
