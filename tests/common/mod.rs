#![allow(dead_code)]

//! Shared fixtures for integration tests: recording filters, small
//! controllers and dispatch helpers over the in-memory transport.

use http::Method;
use std::sync::{Arc, Mutex};
use strest::connection::MemoryTransport;
use strest::controller::{Controller, ControllerDescriptor, RequestContext, TransactionHandle};
use strest::dispatcher::Dispatcher;
use strest::error::StrestError;
use strest::filter::ControllerFilter;
use strest::packet::{HeaderName, StrestRequest, StrestResponse, TxnStatus};

/// Ordered record of hook invocations, shared between filters and the test.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// Filter that records `name:before`, `name:after` and `name:error(code)`.
pub struct RecordingFilter {
    pub name: &'static str,
    pub log: EventLog,
}

impl ControllerFilter for RecordingFilter {
    fn before(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        self.log.push(format!("{}:before", self.name));
        Ok(())
    }

    fn after(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        self.log.push(format!("{}:after", self.name));
        Ok(())
    }

    fn error(&self, _ctx: &mut RequestContext, err: &StrestError) -> anyhow::Result<()> {
        self.log.push(format!("{}:error({})", self.name, err.code()));
        Ok(())
    }
}

/// Register a [`RecordingFilter`] named `name` on `dispatcher`.
pub fn record(dispatcher: &Dispatcher, name: &'static str, log: &EventLog) {
    let log = log.clone();
    dispatcher.register_filter(name, move || RecordingFilter {
        name,
        log: log.clone(),
    });
}

/// Answers GET with a fixed text body.
#[derive(Default)]
pub struct Plain;

impl Controller for Plain {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        ctx.set_response_text("plain", "text/plain");
        Ok(())
    }
}

/// GET fails with a plain error, POST with a protocol error, PUT panics.
#[derive(Default)]
pub struct Failing;

impl Controller for Failing {
    fn handle_get(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        anyhow::bail!("database unavailable")
    }

    fn handle_post(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        Err(StrestError::forbidden().into())
    }

    fn handle_put(&mut self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        panic!("controller exploded")
    }
}

/// Keeps the transaction open after responding.
#[derive(Default)]
pub struct Subscribe;

impl Controller for Subscribe {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        ctx.set_txn_status(TxnStatus::Open);
        ctx.set_response_text("subscribed", "text/plain");
        Ok(())
    }
}

/// Echoes the merged parameters as JSON.
#[derive(Default)]
pub struct EchoParams;

impl Controller for EchoParams {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let params = ctx.params().clone();
        ctx.set_response_json(&params)?;
        Ok(())
    }

    fn handle_post(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        self.handle_get(ctx)
    }
}

/// Streams one partial response, then answers with the final one.
#[derive(Default)]
pub struct Streaming;

impl Controller for Streaming {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        ctx.send_partial(|r| r.set_text("text/plain", "working"));
        ctx.set_response_text("done", "text/plain");
        Ok(())
    }
}

/// Prepares a response but turns sending off.
#[derive(Default)]
pub struct Silent;

impl Controller for Silent {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        ctx.set_response_text("unsent", "text/plain");
        ctx.set_send_response(false);
        Ok(())
    }
}

/// Parks every GET and hands its transaction handle to the test. POST takes
/// a handle and then fails.
pub struct Deferred {
    pub handles: Arc<Mutex<Vec<TransactionHandle>>>,
}

impl Controller for Deferred {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let handle = ctx.transaction_handle();
        self.handles.lock().unwrap().push(handle);
        Ok(())
    }

    fn handle_post(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let handle = ctx.transaction_handle();
        self.handles.lock().unwrap().push(handle);
        anyhow::bail!("failed after taking a handle")
    }
}

/// Skips the action from `before`.
pub struct SkipAction;

impl ControllerFilter for SkipAction {
    fn before(&self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        ctx.set_skip_execution(true);
        Ok(())
    }
}

/// Fails in `after`.
pub struct FailingAfter;

impl ControllerFilter for FailingAfter {
    fn after(&self, _ctx: &mut RequestContext) -> anyhow::Result<()> {
        anyhow::bail!("after hook failed")
    }
}

/// Fails in `error`.
pub struct FailingOnError;

impl ControllerFilter for FailingOnError {
    fn error(&self, _ctx: &mut RequestContext, _err: &StrestError) -> anyhow::Result<()> {
        anyhow::bail!("error hook failed")
    }
}

/// Panics in `error`.
pub struct PanicOnError;

impl ControllerFilter for PanicOnError {
    fn error(&self, _ctx: &mut RequestContext, _err: &StrestError) -> anyhow::Result<()> {
        panic!("error hook exploded")
    }
}

/// Descriptor for [`Deferred`] that never waits for its handles.
pub fn stash(route: &str, handles: &Arc<Mutex<Vec<TransactionHandle>>>) -> ControllerDescriptor {
    let handles = Arc::clone(handles);
    ControllerDescriptor::new("stash", move || Deferred {
        handles: Arc::clone(&handles),
    })
    .route(route)
}

/// Descriptor for [`Deferred`] on `route`, GET declared async.
pub fn deferred(
    route: &str,
    handles: &Arc<Mutex<Vec<TransactionHandle>>>,
) -> ControllerDescriptor {
    let handles = Arc::clone(handles);
    ControllerDescriptor::new("deferred", move || Deferred {
        handles: Arc::clone(&handles),
    })
    .route(route)
    .async_method(Method::GET)
}

pub fn transport() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new())
}

/// Native request with a transaction id.
pub fn strest(method: Method, uri: &str, txn_id: &str) -> StrestRequest {
    StrestRequest::strest(method, uri).with_header(HeaderName::TxnId, txn_id)
}

/// Dispatch on a fresh connection and return everything written to it.
pub fn send(dispatcher: &Dispatcher, request: StrestRequest) -> Vec<StrestResponse> {
    let transport = transport();
    dispatcher.incoming(transport.clone(), request);
    transport.sent()
}

/// Dispatch expecting exactly one response.
pub fn send_one(dispatcher: &Dispatcher, request: StrestRequest) -> StrestResponse {
    let mut sent = send(dispatcher, request);
    assert_eq!(sent.len(), 1, "expected exactly one response");
    sent.remove(0)
}
