use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::header::HeaderName;
use super::txn::{TxnAccept, TxnStatus};

/// Maximum inline headers before heap allocation.
/// Most packets carry the three transaction headers plus content headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Ordered header storage; names compare case-insensitively.
///
/// Header names are `Arc<str>` because the well-known names repeat on every
/// packet and cloning a packet then only bumps reference counts.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Protocol name assumed when a packet does not declare one.
pub const STREST_PROTOCOL: &str = "STREST";

/// Protocol name and version declared on the wire (`STREST/0.1`, `HTTP/1.1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub name: String,
    pub major: u16,
    pub minor: u16,
}

impl Protocol {
    #[must_use]
    pub fn new(name: impl Into<String>, major: u16, minor: u16) -> Self {
        Self {
            name: name.into(),
            major,
            minor,
        }
    }

    /// Build from a `major.minor` float such as `1.1` or `0.2`.
    #[must_use]
    pub fn from_version(name: impl Into<String>, version: f32) -> Self {
        let rendered = version.to_string();
        let mut parts = rendered.split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Self::new(name, major, minor)
    }

    #[must_use]
    pub fn strest() -> Self {
        Self::new(STREST_PROTOCOL, 0, 1)
    }

    #[must_use]
    pub fn http11() -> Self {
        Self::new("HTTP", 1, 1)
    }

    /// Version as `major.minor`.
    #[must_use]
    pub fn version(&self) -> f32 {
        format!("{}.{}", self.major, self.minor)
            .parse()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn is_strest(&self) -> bool {
        self.name.eq_ignore_ascii_case(STREST_PROTOCOL)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.name, self.major, self.minor)
    }
}

/// Headers, content, protocol and transaction state shared by requests and
/// responses, independent of the wire representation.
///
/// After [`Packet::cleanup`] the content buffer is gone and the packet must
/// not be reused; content accessors return `None` from then on.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    headers: HeaderVec,
    content: Option<Vec<u8>>,
    protocol: Option<Protocol>,
    released: bool,
}

impl Packet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_protocol(protocol: Protocol) -> Self {
        Self {
            protocol: Some(protocol),
            ..Self::default()
        }
    }

    /// First value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for a header, in insertion order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Append a header value. Empty names are ignored.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        if name.is_empty() {
            return;
        }
        self.headers.push((Arc::from(name), value.into()));
    }

    /// Replace every value of a header with a single one.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        if name.is_empty() {
            return;
        }
        self.remove_header(name);
        self.headers.push((Arc::from(name), value.into()));
    }

    pub fn remove_header(&mut self, name: impl AsRef<str>) {
        let name = name.as_ref();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(HeaderName::ContentType)
    }

    /// Set the payload together with its content type and length.
    pub fn set_content(&mut self, content_type: &str, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        self.set_header(HeaderName::ContentType, content_type);
        self.set_header(HeaderName::ContentLength, bytes.len().to_string());
        self.content = Some(bytes);
        self.released = false;
    }

    pub fn set_text(&mut self, content_type: &str, text: &str) {
        self.set_content(content_type, text.as_bytes().to_vec());
    }

    /// Serialize structured content as `application/json`.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set_content("application/json", bytes);
        Ok(())
    }

    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        if self.released {
            warn!("content accessed after packet cleanup");
            return None;
        }
        self.content.as_deref()
    }

    /// Content decoded as UTF-8, `None` if absent or not valid UTF-8.
    #[must_use]
    pub fn content_as_string(&self) -> Option<String> {
        self.content()
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
    }

    /// Parse the content as JSON.
    pub fn json_content<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(self.content().unwrap_or_default())
    }

    pub fn set_protocol(&mut self, name: &str, version: f32) {
        self.protocol = Some(Protocol::from_version(name, version));
    }

    #[must_use]
    pub fn protocol(&self) -> Option<&Protocol> {
        self.protocol.as_ref()
    }

    /// Declared protocol name, `STREST` when none was declared.
    #[must_use]
    pub fn protocol_name(&self) -> &str {
        self.protocol
            .as_ref()
            .map_or(STREST_PROTOCOL, |p| p.name.as_str())
    }

    /// Declared protocol version, 0 when none was declared.
    #[must_use]
    pub fn protocol_version(&self) -> f32 {
        self.protocol.as_ref().map_or(0.0, Protocol::version)
    }

    #[must_use]
    pub fn txn_id(&self) -> Option<&str> {
        self.header(HeaderName::TxnId)
    }

    pub fn set_txn_id(&mut self, id: impl Into<String>) {
        self.set_header(HeaderName::TxnId, id);
    }

    /// Transaction status if the header is present and valid.
    #[must_use]
    pub fn txn_status(&self) -> Option<TxnStatus> {
        self.header(HeaderName::TxnStatus)
            .and_then(|v| v.parse().ok())
    }

    pub fn set_txn_status(&mut self, status: TxnStatus) {
        self.set_header(HeaderName::TxnStatus, status.as_str());
    }

    #[must_use]
    pub fn txn_accept(&self) -> TxnAccept {
        TxnAccept::from_header(self.header(HeaderName::TxnAccept))
    }

    /// Release the content buffer. The packet must not be reused afterwards.
    pub fn cleanup(&mut self) {
        self.content = None;
        self.released = true;
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }
}
