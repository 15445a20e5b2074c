//! # Connection Module
//!
//! One [`ConnectionChannel`] exists per physical transport connection. It
//! owns the [`Transport`] handle, remembers which transactions are in flight
//! and runs disconnect callbacks exactly once.
//!
//! The channel sends; it does not multiplex. Any number of transactions can be
//! in flight on one connection, identified by their `Txn-Id`.

mod core;
mod memory;
#[cfg(test)]
mod tests;
mod transport;

pub use self::core::{ConnectionChannel, DisconnectCallback, InFlight};
pub use memory::MemoryTransport;
pub use transport::{Transport, WriteAck};
