use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use super::context::RequestContext;
use crate::connection::{ConnectionChannel, WriteAck};
use crate::dispatcher::Dispatcher;
use crate::ids::RequestId;
use crate::packet::{StrestResponse, TxnAccept};

/// Work to run on the context when an asynchronous transaction completes.
pub(crate) type Completion =
    Box<dyn FnOnce(&mut RequestContext) -> anyhow::Result<()> + Send + 'static>;

enum SlotState {
    /// The action is still running on the dispatching thread.
    Running,
    /// The action returned; the context waits for completion.
    Parked(Box<RequestContext>),
    /// Completion arrived while the action was still running.
    Early(Completion),
    Done,
}

/// Rendezvous between the dispatching thread parking a context and external
/// code completing it. Whichever side arrives second runs the completion;
/// either way it runs exactly once.
pub(crate) struct CompletionSlot {
    state: Mutex<SlotState>,
}

impl CompletionSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Running),
        }
    }

    /// Called by the dispatcher after an asynchronous action returned.
    ///
    /// Returns the context back together with the completion if external code
    /// already completed the transaction.
    pub(crate) fn park(
        &self,
        ctx: RequestContext,
    ) -> Option<(RequestContext, Completion)> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, SlotState::Done) {
            SlotState::Early(completion) => Some((ctx, completion)),
            SlotState::Running => {
                *state = SlotState::Parked(Box::new(ctx));
                None
            }
            other => {
                // Parked or Done: a second park cannot happen for one request.
                *state = other;
                warn!(request_id = %ctx.request_id(), "Transaction parked twice; dropping context");
                None
            }
        }
    }

    /// Called by the dispatcher when the transaction finishes without
    /// parking, because the action was synchronous or failed. Later
    /// completions are refused. A completion queued by the action is handed
    /// back.
    pub(crate) fn close(&self) -> Option<Completion> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, SlotState::Done) {
            SlotState::Early(completion) => Some(completion),
            SlotState::Parked(ctx) => {
                // Only `park` stores a context, and parked slots are never closed.
                *state = SlotState::Parked(ctx);
                None
            }
            SlotState::Running | SlotState::Done => None,
        }
    }

    fn complete(&self, completion: Completion) -> CompleteOutcome {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, SlotState::Done) {
            SlotState::Running => {
                *state = SlotState::Early(completion);
                CompleteOutcome::Queued
            }
            SlotState::Parked(ctx) => CompleteOutcome::Resume(*ctx, completion),
            other => {
                *state = other;
                CompleteOutcome::AlreadyDone
            }
        }
    }
}

enum CompleteOutcome {
    Resume(RequestContext, Completion),
    Queued,
    AlreadyDone,
}

/// Completes an asynchronous transaction from outside the dispatch call.
///
/// Obtained from [`RequestContext::transaction_handle`] inside an action that
/// was declared async. Cloneable and `Send`; completion may happen on any
/// thread, before or after the action returns, and at most once.
///
/// ```rust,ignore
/// fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
///     let handle = ctx.transaction_handle();
///     std::thread::spawn(move || {
///         handle.send_partial(|r| r.set_text("text/plain", "working"));
///         handle.complete(|ctx| {
///             ctx.set_response_text("done", "text/plain");
///             Ok(())
///         });
///     });
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TransactionHandle {
    slot: Arc<CompletionSlot>,
    dispatcher: Dispatcher,
    connection: Arc<ConnectionChannel>,
    request_id: RequestId,
    txn_id: Option<String>,
    txn_accept: TxnAccept,
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("request_id", &self.request_id)
            .field("txn_id", &self.txn_id)
            .field("connection", &self.connection.id())
            .finish_non_exhaustive()
    }
}

impl TransactionHandle {
    pub(crate) fn new(
        slot: Arc<CompletionSlot>,
        dispatcher: Dispatcher,
        connection: Arc<ConnectionChannel>,
        request_id: RequestId,
        txn_id: Option<String>,
        txn_accept: TxnAccept,
    ) -> Self {
        Self {
            slot,
            dispatcher,
            connection,
            request_id,
            txn_id,
            txn_accept,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn txn_id(&self) -> Option<&str> {
        self.txn_id.as_deref()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<ConnectionChannel> {
        &self.connection
    }

    /// Send an intermediate `continue` response for this transaction.
    ///
    /// Returns `None` without sending when the client sent
    /// `Txn-Accept: single` or the connection is gone.
    pub fn send_partial<F>(&self, build: F) -> Option<WriteAck>
    where
        F: FnOnce(&mut StrestResponse),
    {
        send_partial(
            &self.connection,
            self.request_id,
            self.txn_id(),
            self.txn_accept,
            build,
        )
    }

    /// Finish the transaction: run `finish` on the context, then the `after`
    /// filters, then send. An error from `finish` takes the error path.
    ///
    /// Returns `false` if the transaction was already completed, or finished
    /// without waiting for this handle (a synchronous or failed action).
    /// Completing after the client disconnected is not an error; nothing is
    /// sent.
    pub fn complete<F>(&self, finish: F) -> bool
    where
        F: FnOnce(&mut RequestContext) -> anyhow::Result<()> + Send + 'static,
    {
        match self.slot.complete(Box::new(finish)) {
            CompleteOutcome::Resume(ctx, completion) => {
                debug!(request_id = %self.request_id, txn_id = ?self.txn_id, "Resuming transaction");
                self.dispatcher.resume(ctx, completion);
                true
            }
            CompleteOutcome::Queued => {
                debug!(request_id = %self.request_id, "Completion queued until action returns");
                true
            }
            CompleteOutcome::AlreadyDone => {
                warn!(
                    request_id = %self.request_id,
                    txn_id = ?self.txn_id,
                    "Transaction already completed"
                );
                false
            }
        }
    }
}

/// Build and send a `continue` response, unless the client accepts only a
/// single response.
pub(crate) fn send_partial<F>(
    connection: &ConnectionChannel,
    request_id: RequestId,
    txn_id: Option<&str>,
    txn_accept: TxnAccept,
    build: F,
) -> Option<WriteAck>
where
    F: FnOnce(&mut StrestResponse),
{
    if txn_accept == TxnAccept::Single {
        warn!(
            request_id = %request_id,
            txn_id = ?txn_id,
            "Partial response refused, client accepts a single response"
        );
        return None;
    }
    let mut partial = StrestResponse::partial(txn_id);
    build(&mut partial);
    connection.send(&partial)
}
