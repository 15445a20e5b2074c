use std::fmt;

/// Well-known header names understood by the protocol layer.
///
/// Lookups are case-insensitive, so a client sending `txn-id` is matched by
/// [`HeaderName::TxnId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderName {
    /// Opaque client-chosen transaction identifier, echoed on every response.
    TxnId,
    /// `open` | `continue` | `complete`, on responses.
    TxnStatus,
    /// Request-only; `single` forbids streamed responses.
    TxnAccept,
    ContentType,
    ContentLength,
}

impl HeaderName {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HeaderName::TxnId => "Txn-Id",
            HeaderName::TxnStatus => "Txn-Status",
            HeaderName::TxnAccept => "Txn-Accept",
            HeaderName::ContentType => "Content-Type",
            HeaderName::ContentLength => "Content-Length",
        }
    }
}

impl AsRef<str> for HeaderName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
