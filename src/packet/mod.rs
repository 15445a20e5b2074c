//! # Packet Module
//!
//! Header/content/transaction model shared by requests and responses.
//!
//! A [`Packet`] is the wire-independent view of one protocol message: ordered
//! headers (case-insensitive for lookup), a byte payload with its content
//! type, the declared protocol, and the transaction headers (`Txn-Id`,
//! `Txn-Status`, `Txn-Accept`). [`StrestRequest`] and [`StrestResponse`] wrap a
//! packet with the request line or status line and dereference to it.
//!
//! Native framing (`toByteArray` on the wire) is the transport's job; nothing
//! here serializes a whole packet.
//!
//! ```rust
//! use strest::packet::{HeaderName, StrestResponse, TxnStatus};
//!
//! let mut response = StrestResponse::new();
//! response.set_txn_id("abc");
//! response.set_txn_status(TxnStatus::Open);
//! response.set_json(&serde_json::json!({ "ok": true })).unwrap();
//!
//! assert_eq!(response.header(HeaderName::TxnId), Some("abc"));
//! assert_eq!(response.content_type(), Some("application/json"));
//! ```

mod core;
mod header;
mod message;
mod txn;

pub use self::core::{HeaderVec, Packet, Protocol, MAX_INLINE_HEADERS, STREST_PROTOCOL};
pub use header::HeaderName;
pub use message::{StrestRequest, StrestResponse};
pub use txn::{TxnAccept, TxnStatus, UnknownTxnStatus};
