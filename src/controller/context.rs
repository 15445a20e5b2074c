use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::descriptor::ControllerDescriptor;
use super::handle::{self, Completion, CompletionSlot, TransactionHandle};
use crate::connection::{ConnectionChannel, WriteAck};
use crate::dispatcher::Dispatcher;
use crate::error::StrestResult;
use crate::filter::ControllerFilter;
use crate::ids::RequestId;
use crate::packet::{StrestRequest, StrestResponse, TxnAccept, TxnStatus};
use crate::params::{self, Params};
use crate::router::ParamVec;

/// The filter chain computed for one request, shared by all phases.
pub type FilterChain = Arc<[Arc<dyn ControllerFilter>]>;

/// Everything one dispatched request carries through the pipeline:
/// route resolution, filters, the controller action and response
/// finalization.
///
/// Created fresh per inbound message and never shared between requests. For
/// asynchronous actions it moves to whichever thread completes the
/// transaction.
pub struct RequestContext {
    request_id: RequestId,
    started: Instant,
    dispatcher: Dispatcher,
    descriptor: Arc<ControllerDescriptor>,
    request: Arc<StrestRequest>,
    response: StrestResponse,
    connection: Arc<ConnectionChannel>,
    filters: FilterChain,
    is_strest: bool,
    txn_id: Option<String>,
    txn_accept: TxnAccept,
    path_params: ParamVec,
    url_params: Params,
    body_params: Params,
    params: Params,
    skip_execution: bool,
    send_response: bool,
    completion: Option<Arc<CompletionSlot>>,
}

impl RequestContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        request_id: RequestId,
        dispatcher: Dispatcher,
        descriptor: Arc<ControllerDescriptor>,
        request: Arc<StrestRequest>,
        connection: Arc<ConnectionChannel>,
        filters: FilterChain,
        path_params: ParamVec,
    ) -> Self {
        let is_strest = request.is_strest();
        let txn_id = if is_strest {
            request.txn_id().map(str::to_string)
        } else {
            None
        };
        let txn_accept = request.txn_accept();
        let response = StrestResponse::for_request(&request);
        Self {
            request_id,
            started: Instant::now(),
            dispatcher,
            descriptor,
            request,
            response,
            connection,
            filters,
            is_strest,
            txn_id,
            txn_accept,
            path_params,
            url_params: Params::new(),
            body_params: Params::new(),
            params: Params::new(),
            skip_execution: false,
            send_response: true,
            completion: None,
        }
    }

    /// Decode URL and body parameters and build the merged map.
    pub(crate) fn load_params(&mut self) -> StrestResult<()> {
        self.url_params = params::url_params(self.request.query(), &self.path_params);
        self.body_params = params::parse_body(self.request.content_type(), self.request.content())?;
        self.params = params::merge(&self.url_params, &self.body_params);
        Ok(())
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Time since the message was received.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The dispatcher (and through it the routing table) serving this request.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<ControllerDescriptor> {
        &self.descriptor
    }

    #[must_use]
    pub fn request(&self) -> &StrestRequest {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &StrestResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut StrestResponse {
        &mut self.response
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<ConnectionChannel> {
        &self.connection
    }

    #[must_use]
    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Whether the message arrived over the native protocol.
    #[must_use]
    pub fn is_strest(&self) -> bool {
        self.is_strest
    }

    /// Transaction id of a native-protocol request.
    #[must_use]
    pub fn txn_id(&self) -> Option<&str> {
        self.txn_id.as_deref()
    }

    /// What the client accepts for this transaction. Under
    /// [`TxnAccept::Single`] partial responses are refused.
    #[must_use]
    pub fn txn_accept(&self) -> TxnAccept {
        self.txn_accept
    }

    /// Change the transaction id used for this and subsequent responses.
    pub fn set_txn_id(&mut self, txn_id: impl Into<String>) {
        let txn_id = txn_id.into();
        self.response.set_txn_id(txn_id.as_str());
        self.txn_id = Some(txn_id);
    }

    /// Mark the transaction `open` to keep it alive after the response, or
    /// `complete` to end it. Forced to `complete` when the client sent
    /// `Txn-Accept: single`.
    pub fn set_txn_status(&mut self, status: TxnStatus) {
        self.response.set_txn_status(status);
    }

    /// Merged parameters: URL (query and path) first, then body.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Parameters from the query string and the matched path.
    #[must_use]
    pub fn url_params(&self) -> &Params {
        &self.url_params
    }

    /// Parameters decoded from the body.
    #[must_use]
    pub fn body_params(&self) -> &Params {
        &self.body_params
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// A parameter as a string, if present and a string.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn skip_execution(&self) -> bool {
        self.skip_execution
    }

    /// From a `before` filter: do not run the action. `after` filters still
    /// run and the response is still sent.
    pub fn set_skip_execution(&mut self, skip: bool) {
        self.skip_execution = skip;
    }

    #[must_use]
    pub fn send_response(&self) -> bool {
        self.send_response
    }

    /// Disable the automatic send at the end of the pipeline; the controller
    /// has sent, or will send, through the connection itself.
    pub fn set_send_response(&mut self, send: bool) {
        self.send_response = send;
    }

    pub fn set_response_bytes(&mut self, bytes: impl Into<Vec<u8>>, content_type: &str) {
        self.response.set_content(content_type, bytes);
    }

    pub fn set_response_text(&mut self, text: &str, content_type: &str) {
        self.response.set_text(content_type, text);
    }

    pub fn set_response_json<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        self.response.set_json(value)
    }

    /// Send an intermediate `continue` response for this transaction.
    ///
    /// Returns `None` without sending when the client sent
    /// `Txn-Accept: single` or the connection is gone.
    pub fn send_partial<F>(&self, build: F) -> Option<WriteAck>
    where
        F: FnOnce(&mut StrestResponse),
    {
        handle::send_partial(
            &self.connection,
            self.request_id,
            self.txn_id(),
            self.txn_accept,
            build,
        )
    }

    /// Handle used to complete an asynchronous action later, possibly from
    /// another thread. Every call returns a handle to the same transaction.
    pub fn transaction_handle(&mut self) -> TransactionHandle {
        let slot = self
            .completion
            .get_or_insert_with(|| Arc::new(CompletionSlot::new()));
        TransactionHandle::new(
            Arc::clone(slot),
            self.dispatcher.clone(),
            Arc::clone(&self.connection),
            self.request_id,
            self.txn_id.clone(),
            self.txn_accept,
        )
    }

    pub(crate) fn take_completion(&mut self) -> Option<Arc<CompletionSlot>> {
        self.completion.take()
    }

    /// Close the completion slot of a transaction that is finishing on the
    /// dispatching thread. Returns a completion queued by the action, if any.
    pub(crate) fn close_completion(&mut self) -> Option<Completion> {
        self.completion.take().and_then(|slot| slot.close())
    }

    pub(crate) fn into_response(self) -> StrestResponse {
        self.response
    }

    pub(crate) fn request_arc(&self) -> &Arc<StrestRequest> {
        &self.request
    }
}
