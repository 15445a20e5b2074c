//! # strest
//!
//! **strest** is a request dispatch and transaction engine for STREST, a
//! request/response protocol with transactions: each request carries a
//! `Txn-Id`, and a server may answer with one response or stream several,
//! marking each `open`, `continue` or `complete` in `Txn-Status`. The same
//! dispatcher also serves plain HTTP requests, closing the connection after
//! each response.
//!
//! ## Overview
//!
//! The library takes a parsed inbound message from a transport and drives it
//! to a response on the same connection:
//!
//! - **[`router`]** - Path patterns with `:name` segments mapped to controllers
//! - **[`controller`]** - The controller trait, its descriptor, the per-request
//!   context and asynchronous completion
//! - **[`filter`]** - `before`/`after`/`error` hooks, registered by name and
//!   attached per controller and per namespace
//! - **[`connection`]** - Per-connection state, in-flight transactions and the
//!   [`Transport`](connection::Transport) seam
//! - **[`packet`]** - Headers, content and transaction state of requests and
//!   responses
//! - **[`dispatcher`]** - The transaction state machine tying it all together
//! - **[`params`]** - Query, path and body parameter decoding
//! - **[`config`]** / **[`logging`]** - Startup configuration and tracing setup
//!
//! Socket handling and wire framing stay outside: a transport implements
//! [`Transport`](connection::Transport) and calls
//! [`Dispatcher::incoming`](dispatcher::Dispatcher::incoming) (or
//! `spawn_incoming` to run on a `may` coroutine) for every message.
//!
//! ## Request Handling Flow
//!
//! ```text
//! transport ──► Dispatcher::incoming
//!                 │ route lookup ─────────────── 404 / 405 ──┐
//!                 │ params, before filters                    │
//!                 │ controller action (sync or async)         │
//!                 │ after filters ─── error ─► error filters ─┤
//!                 ▼                                           ▼
//!              resolve Txn-Status ─► ConnectionChannel::send ─► close if not STREST
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use strest::connection::MemoryTransport;
//! use strest::controllers::HelloWorld;
//! use strest::dispatcher::Dispatcher;
//! use strest::packet::{HeaderName, StrestRequest};
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.register_controller(HelloWorld::descriptor());
//! dispatcher.set_default_filters(None, &["logging"]);
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let request = StrestRequest::strest(http::Method::GET, "/hello/earth")
//!     .with_header(HeaderName::TxnId, "42");
//! dispatcher.incoming(transport.clone(), request);
//!
//! let response = &transport.sent()[0];
//! assert_eq!(response.status(), 200);
//! assert_eq!(response.txn_id(), Some("42"));
//! assert_eq!(response.content_as_string().as_deref(), Some("Hello EARTH!"));
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod controller;
pub mod controllers;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod ids;
pub mod logging;
pub mod packet;
pub mod params;
pub mod router;

pub use controller::{Controller, ControllerDescriptor, RequestContext, TransactionHandle};
pub use dispatcher::Dispatcher;
pub use error::{StrestError, StrestResult};
pub use filter::{ControllerFilter, FilterRegistry};
pub use packet::{StrestRequest, StrestResponse, TxnStatus};
