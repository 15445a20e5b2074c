//! # Controller Module
//!
//! Controllers handle requests. Each controller type is described once by a
//! [`ControllerDescriptor`] (routes, namespace, declared filters, async verbs,
//! factory) and a fresh instance is created for every dispatched message.
//!
//! ## Writing a controller
//!
//! ```rust
//! use strest::controller::{Controller, ControllerDescriptor, RequestContext};
//!
//! #[derive(Default)]
//! struct Echo;
//!
//! impl Controller for Echo {
//!     fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
//!         let word = ctx.param_str("word").unwrap_or("nothing").to_string();
//!         ctx.set_response_text(&word, "text/plain");
//!         Ok(())
//!     }
//! }
//!
//! let descriptor = ControllerDescriptor::of::<Echo>("echo").route("/echo/:word");
//! assert_eq!(descriptor.routes(), ["/echo/:word"]);
//! ```
//!
//! ## Errors
//!
//! Actions return `anyhow::Result`. Returning a
//! [`StrestError`](crate::error::StrestError) sets that status on the
//! response; any other error becomes `500 Internal Server Error`. Either way
//! the error filters run before the response is sent.
//!
//! ## Asynchronous actions
//!
//! Verbs marked with [`ControllerDescriptor::async_method`] may return before
//! the response is ready. The action takes a [`TransactionHandle`] from the
//! context and calls [`TransactionHandle::complete`] later, from any thread.
//! The `after` filters and the send happen at completion time.

mod context;
mod core;
mod descriptor;
mod handle;

pub use self::core::Controller;
pub use context::{FilterChain, RequestContext};
pub use descriptor::{ControllerDescriptor, ControllerFactory, DEFAULT_NAMESPACE};
pub use handle::TransactionHandle;

pub(crate) use handle::{Completion, CompletionSlot};
