//! # Router Module
//!
//! The routing table maps URL-style path patterns to handlers.
//!
//! ## Patterns
//!
//! Patterns are split on `/`. A literal segment must match exactly; a
//! `:name` segment matches any single non-empty segment and captures it:
//!
//! ```rust
//! use std::sync::Arc;
//! use strest::router::RouteTable;
//!
//! let table = RouteTable::new();
//! table.add_route("/hello/:name", Arc::new("hello"));
//!
//! let m = table.find("/hello/Earth?verbose=1").unwrap();
//! assert_eq!(*m.handler, "hello");
//! assert_eq!(m.get_path_param("name"), Some("Earth"));
//! ```
//!
//! ## Overlapping patterns
//!
//! When several patterns match, the one with the fewest parameterized
//! segments wins; equally specific patterns resolve to the first registered.
//!
//! ## Concurrency
//!
//! `find` reads an immutable snapshot and is safe under any number of
//! concurrent callers. `add_route` publishes a new snapshot and is meant to
//! run during startup.

mod core;
mod pattern;

pub use self::core::{RouteMatch, RouteTable};
pub use pattern::{ParamVec, RoutePattern, MAX_INLINE_PARAMS};
