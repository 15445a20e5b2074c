//! # Dispatcher Module
//!
//! The dispatcher takes one inbound message from a transport and carries it
//! through to a response on the same connection.
//!
//! ## Request Flow
//!
//! 1. Look up (or create) the connection channel for the transport and record
//!    the transaction as in flight
//! 2. Find the route; no match answers `404`, a verb other than
//!    GET/POST/PUT/DELETE answers `405`, and no filter runs for either
//! 3. Decode parameters (query, path, then body)
//! 4. Run the `before` hooks of the filter chain; any hook may skip the action
//! 5. Create a fresh controller and call the action for the verb
//! 6. Run the `after` hooks, resolve `Txn-Status` and send
//!
//! Any error or panic in steps 3 to 6 moves the request onto the error path:
//! the response takes the error's status, the transaction is forced
//! `complete`, every `error` hook runs best-effort and the response is sent.
//!
//! ## Transactions and connections
//!
//! The response's `Txn-Status` is `complete` unless the controller set it
//! otherwise, and always `complete` when the client sent `Txn-Accept: single`.
//! Native STREST connections stay open after a response. Anything else is
//! closed once its response is written.
//!
//! ## Asynchronous actions
//!
//! For verbs declared async the action returns early and
//! [`TransactionHandle::complete`](crate::controller::TransactionHandle::complete)
//! finishes steps 6 later. The dispatching thread is free in the meantime.
//!
//! ```rust
//! use std::sync::Arc;
//! use strest::connection::MemoryTransport;
//! use strest::controller::{Controller, ControllerDescriptor, RequestContext};
//! use strest::dispatcher::Dispatcher;
//! use strest::packet::StrestRequest;
//!
//! #[derive(Default)]
//! struct Ping;
//!
//! impl Controller for Ping {
//!     fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
//!         ctx.set_response_text("pong", "text/plain");
//!         Ok(())
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.register_controller(ControllerDescriptor::of::<Ping>("ping").route("/ping"));
//!
//! let transport = Arc::new(MemoryTransport::new());
//! dispatcher.incoming(transport.clone(), StrestRequest::strest(http::Method::GET, "/ping"));
//!
//! let sent = transport.sent();
//! assert_eq!(sent[0].status(), 200);
//! assert_eq!(sent[0].content_as_string().as_deref(), Some("pong"));
//! ```
//!
//! ## Coroutines
//!
//! [`Dispatcher::incoming`] runs on the calling thread.
//! [`Dispatcher::spawn_incoming`] runs it on a `may` coroutine whose stack
//! size comes from configuration (`STREST_STACK_SIZE`).

mod core;

pub use self::core::Dispatcher;
