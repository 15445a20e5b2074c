use dashmap::DashMap;
use http::Method;
use may::coroutine;
use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{StrestConfig, DEFAULT_STACK_SIZE};
use crate::connection::{ConnectionChannel, Transport};
use crate::controller::{Completion, Controller, ControllerDescriptor, RequestContext};
use crate::error::{StrestError, StrestResult};
use crate::filter::{ControllerFilter, FilterRegistry};
use crate::ids::{ConnectionId, RequestId};
use crate::packet::{StrestRequest, StrestResponse, TxnAccept, TxnStatus};
use crate::router::RouteTable;

/// What to do once the action has returned.
enum Flow {
    Finish,
    Suspend,
}

struct DispatcherInner {
    routes: RouteTable<ControllerDescriptor>,
    filters: FilterRegistry,
    connections: DashMap<ConnectionId, Arc<ConnectionChannel>>,
    stack_size: AtomicUsize,
}

/// Runs inbound messages through routing, filters and controllers and sends
/// the response back over the originating connection.
///
/// Cheap to clone; every clone shares the same routing table, filter
/// registry and connection map. One dispatcher serves all connections of a
/// server and is safe to call from any number of threads or coroutines.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                routes: RouteTable::new(),
                filters: FilterRegistry::with_builtins(),
                connections: DashMap::new(),
                stack_size: AtomicUsize::new(DEFAULT_STACK_SIZE),
            }),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.inner.routes.len())
            .field("filters", &self.inner.filters)
            .field("connections", &self.inner.connections.len())
            .field("stack_size", &self.stack_size())
            .finish()
    }
}

impl Dispatcher {
    /// Empty dispatcher with the built-in filters registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: &StrestConfig) -> Self {
        let dispatcher = Self::new();
        dispatcher.apply_config(config);
        dispatcher
    }

    /// Apply stack size and namespace default filters from `config`.
    pub fn apply_config(&self, config: &StrestConfig) {
        if let Some(stack_size) = config.stack_size {
            self.set_stack_size(stack_size);
        }
        let mut namespaces: Vec<_> = config.filters.iter().collect();
        namespaces.sort_by(|a, b| a.0.cmp(b.0));
        for (namespace, names) in namespaces {
            self.inner
                .filters
                .set_default_filters(Some(namespace.as_str()), names.as_slice());
        }
    }

    /// Register every route of `descriptor`. A controller without routes is
    /// skipped with a warning.
    pub fn register_controller(&self, descriptor: ControllerDescriptor) {
        if descriptor.routes().is_empty() {
            warn!(controller = %descriptor.name(), "Controller has no routes, skipping");
            return;
        }
        let descriptor = Arc::new(descriptor);
        for pattern in descriptor.routes() {
            self.add_route(pattern, Arc::clone(&descriptor));
        }
        info!(
            controller = %descriptor.name(),
            namespace = %descriptor.namespace(),
            routes = ?descriptor.routes(),
            filters = ?descriptor.filter_names(),
            "Controller registered"
        );
    }

    /// Route `pattern` to `descriptor`, independent of the routes it
    /// declares.
    pub fn add_route(&self, pattern: &str, descriptor: Arc<ControllerDescriptor>) {
        self.inner.routes.add_route(pattern, descriptor);
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable<ControllerDescriptor> {
        &self.inner.routes
    }

    #[must_use]
    pub fn filters(&self) -> &FilterRegistry {
        &self.inner.filters
    }

    pub fn register_filter<F, T>(&self, name: &str, factory: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: ControllerFilter + 'static,
    {
        self.inner.filters.register(name, factory);
    }

    /// Replace the default filters for `namespace` (`None` for the default
    /// namespace).
    pub fn set_default_filters<S: AsRef<str>>(&self, namespace: Option<&str>, names: &[S]) {
        self.inner.filters.set_default_filters(namespace, names);
    }

    /// Stack size used by [`Dispatcher::spawn_incoming`].
    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.inner.stack_size.load(Ordering::Relaxed)
    }

    pub fn set_stack_size(&self, stack_size: usize) {
        self.inner.stack_size.store(stack_size, Ordering::Relaxed);
    }

    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<Arc<ConnectionChannel>> {
        self.inner
            .connections
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Forget a connection and release its state. Returns `false` if it was
    /// not known.
    pub fn remove_connection(&self, id: ConnectionId) -> bool {
        match self.inner.connections.remove(&id) {
            Some((_, channel)) => {
                channel.cleanup();
                debug!(connection_id = %id, "Connection removed");
                true
            }
            None => false,
        }
    }

    /// Called by the transport when the peer went away.
    pub fn disconnected(&self, id: ConnectionId) -> bool {
        info!(connection_id = %id, "Transport reported disconnect");
        self.remove_connection(id)
    }

    /// Dispatch one inbound message end to end on the calling thread.
    ///
    /// Never fails: every outcome, including routing errors and panics in
    /// controller or filter code, ends in exactly one final response unless
    /// the transport is already gone. Asynchronous actions return here before
    /// their response is sent.
    pub fn incoming(&self, transport: Arc<dyn Transport>, request: StrestRequest) {
        let request_id = RequestId::new();
        let connection = self.channel_for(transport);
        connection.incoming(request_id, &request);

        info!(
            request_id = %request_id,
            connection_id = %connection.id(),
            method = %request.method(),
            uri = %request.uri(),
            protocol = %request.protocol_name(),
            txn_id = ?request.txn_id(),
            "Request received"
        );

        let request = Arc::new(request);
        let Some(route) = self.inner.routes.find(request.uri()) else {
            self.reject(&connection, request_id, &request, &StrestError::not_found());
            return;
        };

        if !is_dispatchable(request.method()) {
            self.reject(
                &connection,
                request_id,
                &request,
                &StrestError::method_not_allowed(),
            );
            return;
        }

        debug!(
            request_id = %request_id,
            controller = %route.handler.name(),
            route_pattern = %route.pattern,
            "Request routed"
        );

        let filters = self.inner.filters.filters_for(&route.handler);
        let mut ctx = RequestContext::new(
            request_id,
            self.clone(),
            route.handler,
            request,
            connection,
            filters,
            route.path_params,
        );

        match self.execute(&mut ctx) {
            Ok(Flow::Finish) => self.finish_response(ctx),
            Ok(Flow::Suspend) => self.suspend(ctx),
            Err(err) => self.fail(ctx, err),
        }
    }

    /// Dispatch on a fresh `may` coroutine with the configured stack size.
    pub fn spawn_incoming(
        &self,
        transport: Arc<dyn Transport>,
        request: StrestRequest,
    ) -> io::Result<coroutine::JoinHandle<()>> {
        let dispatcher = self.clone();
        let stack_size = self.stack_size();

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns everything it touches (Send + 'static) and dispatch
        // reports failures through the response, not by unwinding out of the
        // coroutine.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(stack_size)
                .spawn(move || dispatcher.incoming(transport, request))
        };

        if let Err(e) = &spawned {
            error!(error = %e, stack_size = stack_size, "Failed to spawn dispatch coroutine");
        }
        spawned
    }

    /// Run a completion supplied through a
    /// [`TransactionHandle`](crate::controller::TransactionHandle) and finish
    /// the transaction.
    pub(crate) fn resume(&self, mut ctx: RequestContext, completion: Completion) {
        let request_id = ctx.request_id();
        let outcome = guarded(request_id, "completion", || completion(&mut ctx));
        match outcome {
            Ok(()) => self.finish_response(ctx),
            Err(err) => self.fail(ctx, err),
        }
    }

    fn channel_for(&self, transport: Arc<dyn Transport>) -> Arc<ConnectionChannel> {
        let id = transport.id();
        let entry = self.inner.connections.entry(id).or_insert_with(|| {
            debug!(connection_id = %id, "Connection registered");
            Arc::new(ConnectionChannel::new(transport))
        });
        Arc::clone(entry.value())
    }

    fn execute(&self, ctx: &mut RequestContext) -> StrestResult<Flow> {
        ctx.load_params()?;

        let request_id = ctx.request_id();
        let filters = Arc::clone(ctx.filters());
        for filter in filters.iter() {
            guarded(request_id, "before filter", || filter.before(ctx))?;
        }

        if ctx.skip_execution() {
            debug!(request_id = %request_id, "Action skipped by filter");
            return Ok(Flow::Finish);
        }

        let method = ctx.request().method().clone();
        let is_async = ctx.descriptor().is_async(&method);
        let mut controller = ctx.descriptor().instantiate();

        debug!(
            request_id = %request_id,
            controller = %ctx.descriptor().name(),
            method = %method,
            is_async = is_async,
            "Action start"
        );
        guarded(request_id, "action", || {
            invoke(controller.as_mut(), &method, ctx)
        })?;

        Ok(if is_async { Flow::Suspend } else { Flow::Finish })
    }

    fn suspend(&self, mut ctx: RequestContext) {
        let Some(slot) = ctx.take_completion() else {
            warn!(
                request_id = %ctx.request_id(),
                controller = %ctx.descriptor().name(),
                "Async action returned without taking a transaction handle, completing now"
            );
            self.finish_response(ctx);
            return;
        };

        let request_id = ctx.request_id();
        match slot.park(ctx) {
            Some((ctx, completion)) => self.resume(ctx, completion),
            None => debug!(request_id = %request_id, "Transaction suspended"),
        }
    }

    fn finish_response(&self, mut ctx: RequestContext) {
        let request_id = ctx.request_id();
        if let Some(completion) = ctx.close_completion() {
            debug!(request_id = %request_id, "Running completion queued by synchronous action");
            if let Err(err) = guarded(request_id, "completion", || completion(&mut ctx)) {
                self.fail(ctx, err);
                return;
            }
        }

        let filters = Arc::clone(ctx.filters());
        for filter in filters.iter() {
            if let Err(err) = guarded(request_id, "after filter", || filter.after(&mut ctx)) {
                self.fail(ctx, err);
                return;
            }
        }

        if !ctx.send_response() {
            debug!(request_id = %request_id, "Response send disabled by controller");
            return;
        }
        self.deliver_context(ctx);
    }

    fn fail(&self, mut ctx: RequestContext, err: StrestError) {
        let request_id = ctx.request_id();
        if ctx.close_completion().is_some() {
            debug!(request_id = %request_id, "Dropping completion queued by failed action");
        }
        if err.code() >= 500 {
            error!(
                request_id = %request_id,
                status = err.code(),
                error = %err,
                cause = ?err.cause().map(ToString::to_string),
                "Request failed"
            );
        } else {
            warn!(request_id = %request_id, status = err.code(), error = %err, "Request failed");
        }

        let response = ctx.response_mut();
        response.set_status(err.code(), err.message());
        response.set_txn_status(TxnStatus::Complete);

        let filters = Arc::clone(ctx.filters());
        for filter in filters.iter() {
            if let Err(hook_err) = guarded(request_id, "error filter", || filter.error(&mut ctx, &err)) {
                warn!(
                    request_id = %request_id,
                    error = %hook_err,
                    "Error filter failed, continuing"
                );
            }
        }

        self.deliver_context(ctx);
    }

    fn reject(
        &self,
        connection: &Arc<ConnectionChannel>,
        request_id: RequestId,
        request: &StrestRequest,
        err: &StrestError,
    ) {
        warn!(
            request_id = %request_id,
            uri = %request.uri(),
            method = %request.method(),
            status = err.code(),
            "Request rejected before dispatch"
        );
        let mut response = StrestResponse::for_request(request);
        response.set_status(err.code(), err.message());
        response.set_txn_status(TxnStatus::Complete);
        self.deliver(connection, request_id, request, response);
    }

    fn deliver_context(&self, ctx: RequestContext) {
        let request_id = ctx.request_id();
        let connection = Arc::clone(ctx.connection());
        let request = Arc::clone(ctx.request_arc());
        let elapsed = ctx.elapsed();
        let response = ctx.into_response();
        debug!(
            request_id = %request_id,
            status = response.status(),
            latency_ms = elapsed.as_millis() as u64,
            "Response ready"
        );
        self.deliver(&connection, request_id, &request, response);
    }

    /// Resolve the transaction status, send, and apply the connection policy.
    fn deliver(
        &self,
        connection: &Arc<ConnectionChannel>,
        request_id: RequestId,
        request: &StrestRequest,
        mut response: StrestResponse,
    ) {
        let mut txn_status = response.txn_status().unwrap_or_default();
        if request.txn_accept() == TxnAccept::Single {
            txn_status = TxnStatus::Complete;
        }
        response.set_txn_status(txn_status);

        if connection.send(&response).is_none() {
            self.forget_channel(connection);
            return;
        }

        if txn_status.is_complete() {
            connection.complete(request_id);
        }

        if !request.is_strest() {
            debug!(connection_id = %connection.id(), "Closing non-STREST connection");
            connection.close();
            self.forget_channel(connection);
        }
    }

    /// Remove `channel` from the map, unless the id was reused since.
    fn forget_channel(&self, channel: &Arc<ConnectionChannel>) {
        let removed = self
            .inner
            .connections
            .remove_if(&channel.id(), |_, current| Arc::ptr_eq(current, channel));
        if removed.is_some() {
            channel.cleanup();
            debug!(connection_id = %channel.id(), "Connection removed");
        }
    }
}

fn is_dispatchable(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    )
}

fn invoke(
    controller: &mut dyn Controller,
    method: &Method,
    ctx: &mut RequestContext,
) -> anyhow::Result<()> {
    match *method {
        Method::GET => controller.handle_get(ctx),
        Method::POST => controller.handle_post(ctx),
        Method::PUT => controller.handle_put(ctx),
        Method::DELETE => controller.handle_delete(ctx),
        _ => Err(StrestError::method_not_allowed().into()),
    }
}

/// Run controller or filter code, turning errors and panics into a
/// `StrestError`.
fn guarded<F>(request_id: RequestId, stage: &'static str, f: F) -> StrestResult<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(StrestError::from_anyhow),
        Err(payload) => {
            let panic_message = panic_message(payload.as_ref());
            error!(
                request_id = %request_id,
                stage = stage,
                panic_message = %panic_message,
                "Panic caught - CRITICAL"
            );
            Err(StrestError::internal_server_error()
                .with_cause(anyhow::anyhow!("{stage} panicked: {panic_message}")))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
