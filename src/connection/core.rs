use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::transport::{Transport, WriteAck};
use crate::ids::{ConnectionId, RequestId};
use crate::packet::{StrestRequest, StrestResponse, TxnStatus};

/// Callback run when a connection goes away.
pub type DisconnectCallback = Box<dyn FnOnce(&ConnectionChannel) + Send + 'static>;

/// A transaction that has been received on this connection and has not yet
/// seen its final response.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub txn_id: Option<String>,
    pub path: String,
    pub started: Instant,
}

/// Per-connection state: the transport handle, in-flight transactions and
/// disconnect callbacks.
///
/// Several transactions may be in flight on one connection at once; they are
/// told apart by their `Txn-Id`, not by send order.
pub struct ConnectionChannel {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<HashMap<RequestId, InFlight>>,
    callbacks: Mutex<Vec<DisconnectCallback>>,
    disconnected: AtomicBool,
}

impl fmt::Debug for ConnectionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionChannel")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl ConnectionChannel {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: transport.id(),
            transport,
            in_flight: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Current transport state. Safe to call concurrently with `send` and
    /// `cleanup`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::Acquire) && self.transport.is_open()
    }

    /// Write a response.
    ///
    /// Returns `None` when the transport is already closed: there is nothing
    /// to do and the caller should drop any state kept for this connection.
    ///
    /// A `complete` response ends every in-flight transaction sharing its
    /// `Txn-Id`, so a transaction left `open` by an earlier response is
    /// released by the first `complete` one that follows.
    pub fn send(&self, response: &StrestResponse) -> Option<WriteAck> {
        if !self.is_connected() {
            info!(
                connection_id = %self.id,
                txn_id = ?response.txn_id(),
                "Channel is closed, user has disconnected"
            );
            return None;
        }

        let result = self.transport.write(response);
        if let Err(e) = &result {
            warn!(
                connection_id = %self.id,
                txn_id = ?response.txn_id(),
                error = %e,
                "Write to transport failed"
            );
        } else {
            debug!(
                connection_id = %self.id,
                txn_id = ?response.txn_id(),
                status = response.status(),
                txn_status = ?response.txn_status(),
                "Response written"
            );
        }
        if response.txn_status() == Some(TxnStatus::Complete) {
            if let Some(txn_id) = response.txn_id() {
                self.complete_txn(txn_id);
            }
        }
        Some(WriteAck::new(result))
    }

    /// Record an inbound message as in flight.
    pub fn incoming(&self, request_id: RequestId, request: &StrestRequest) {
        let entry = InFlight {
            txn_id: request.txn_id().map(str::to_string),
            path: request.path().to_string(),
            started: Instant::now(),
        };
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_id, entry);
    }

    /// Forget every in-flight transaction with this `Txn-Id`. Returns how
    /// many were removed.
    pub fn complete_txn(&self, txn_id: &str) -> usize {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = in_flight.len();
        in_flight.retain(|_, entry| entry.txn_id.as_deref() != Some(txn_id));
        let removed = before - in_flight.len();
        if removed > 0 {
            debug!(
                connection_id = %self.id,
                txn_id = %txn_id,
                removed = removed,
                "Transaction completed"
            );
        }
        removed
    }

    /// Forget an in-flight transaction once its final response went out.
    pub fn complete(&self, request_id: RequestId) -> Option<InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&request_id)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Transaction ids currently in flight, unordered.
    #[must_use]
    pub fn in_flight_txn_ids(&self) -> Vec<String> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter_map(|f| f.txn_id.clone())
            .collect()
    }

    /// Register a callback for when this connection goes away.
    ///
    /// Callbacks registered after the disconnect run immediately.
    pub fn on_disconnect<F>(&self, callback: F)
    where
        F: FnOnce(&ConnectionChannel) + Send + 'static,
    {
        {
            let mut callbacks = self
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.disconnected.load(Ordering::Acquire) {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback(self);
    }

    /// Mark the connection as gone and run every disconnect callback.
    ///
    /// Idempotent: only the first call runs callbacks.
    pub fn disconnected(&self) {
        let callbacks = {
            let mut callbacks = self
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.disconnected.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *callbacks)
        };

        info!(
            connection_id = %self.id,
            callbacks = callbacks.len(),
            in_flight = self.in_flight_count(),
            "Connection disconnected"
        );
        for callback in callbacks {
            callback(self);
        }
    }

    /// Close the transport.
    pub fn close(&self) {
        self.transport.close();
    }

    /// Release per-connection state. Disconnect callbacks that have not run
    /// yet run now, since nothing can reach this channel afterwards. The
    /// transport itself is left alone.
    pub fn cleanup(&self) {
        self.disconnected();
        let dropped = std::mem::take(
            &mut *self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if !dropped.is_empty() {
            debug!(
                connection_id = %self.id,
                dropped = dropped.len(),
                "Dropped in-flight transactions on cleanup"
            );
        }
    }
}
