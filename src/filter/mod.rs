//! # Filter Module
//!
//! Filters wrap every controller action with `before`, `after` and `error`
//! hooks. They are registered by name in a [`FilterRegistry`] and attached to
//! controllers in two ways:
//!
//! - declared on the [`ControllerDescriptor`](crate::controller::ControllerDescriptor)
//!   with `.filter("name")`
//! - listed as defaults for the controller's namespace with
//!   [`FilterRegistry::set_default_filters`]
//!
//! A request's chain is the declared filters followed by the namespace
//! defaults. The same ordered chain is used for all three phases.
//!
//! ## Short-circuiting
//!
//! A `before` hook may call `ctx.set_skip_execution(true)` to keep the action
//! from running, for example to reject an unauthenticated request or answer
//! from a cache. `after` hooks still run and the response is still sent.
//!
//! ```rust
//! use strest::controller::RequestContext;
//! use strest::filter::{ControllerFilter, FilterRegistry};
//!
//! struct RequireToken;
//!
//! impl ControllerFilter for RequireToken {
//!     fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
//!         if ctx.request().header("Authorization").is_none() {
//!             ctx.response_mut().set_status(401, "Unauthorized");
//!             ctx.set_skip_execution(true);
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let registry = FilterRegistry::with_builtins();
//! registry.register("token", || RequireToken);
//! registry.set_default_filters(None, &["token", "logging"]);
//! assert_eq!(registry.namespace_filters("default"), ["token", "logging"]);
//! ```
//!
//! ## Sharing
//!
//! One instance per name serves all concurrent requests. Keep per-request
//! state in the context, not in the filter.

mod builtin;
mod core;
mod registry;

pub use self::core::ControllerFilter;
pub use builtin::{LoggingFilter, MetricsFilter};
pub use registry::FilterRegistry;
