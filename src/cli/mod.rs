//! # CLI Module
//!
//! The `strest` binary drives the dispatcher from the command line over an
//! in-memory transport. It is a quick way to see routing, filters and
//! transaction headers at work without a network listener.
//!
//! ## Commands
//!
//! ### `request`
//!
//! ```bash
//! strest request GET /hello/world
//! strest request GET '/hello/world' --http
//! strest request POST /hello/x -H 'Txn-Accept: single' --data '{"a": 1}'
//! ```
//!
//! ### `routes`
//!
//! ```bash
//! strest --config strest.yaml routes
//! ```
//!
//! ## Configuration
//!
//! `--config` (or `STREST_CONFIG`) points at a YAML file; see
//! [`crate::config`]. Logging is configured through `STREST_LOG_*`; see
//! [`crate::logging`].

mod commands;


pub use commands::{build_request, dispatch, format_response, run_cli, Cli, Commands};
