//! Tests for asynchronous actions and `TransactionHandle`
//!
//! An action declared async returns before its response exists. These tests
//! cover completion from other threads, completion racing the action itself,
//! streamed `continue` responses, completion after the client left and
//! handles whose transaction finished without them.

mod common;

use common::*;
use http::Method;
use std::sync::{Arc, Mutex};
use strest::connection::Transport;
use strest::controller::{Controller, ControllerDescriptor, RequestContext, TransactionHandle};
use strest::dispatcher::Dispatcher;
use strest::packet::{HeaderName, TxnStatus};

type Handles = Arc<Mutex<Vec<TransactionHandle>>>;

fn deferred_dispatcher(handles: &Handles) -> Dispatcher {
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(deferred("/jobs/:id", handles));
    dispatcher
}

fn first_handle(handles: &Handles) -> TransactionHandle {
    handles.lock().unwrap()[0].clone()
}

fn finish_with(text: &'static str) -> impl FnOnce(&mut RequestContext) -> anyhow::Result<()> + Send {
    move |ctx: &mut RequestContext| {
        ctx.set_response_text(text, "text/plain");
        Ok(())
    }
}

#[test]
fn test_nothing_sent_until_complete() {
    let handles = Handles::default();
    let dispatcher = deferred_dispatcher(&handles);
    let transport = transport();

    dispatcher.incoming(transport.clone(), strest(Method::GET, "/jobs/1", "j1"));

    assert_eq!(transport.sent_count(), 0);
    let channel = dispatcher.connection(transport.id()).unwrap();
    assert_eq!(channel.in_flight_txn_ids(), ["j1"]);

    let handle = first_handle(&handles);
    assert_eq!(handle.txn_id(), Some("j1"));
    assert!(handle.is_connected());
    assert!(handle.complete(finish_with("done")));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status(), 200);
    assert_eq!(sent[0].txn_id(), Some("j1"));
    assert_eq!(sent[0].txn_status(), Some(TxnStatus::Complete));
    assert_eq!(sent[0].content_as_string().as_deref(), Some("done"));
    assert_eq!(channel.in_flight_count(), 0);
}

#[test]
fn test_complete_from_another_thread_runs_after_filters() {
    let handles = Handles::default();
    let dispatcher = Dispatcher::new();
    let log = EventLog::default();
    record(&dispatcher, "audit", &log);
    dispatcher.register_controller(deferred("/jobs/:id", &handles).filter("audit"));
    let transport = transport();

    dispatcher.incoming(transport.clone(), strest(Method::GET, "/jobs/2", "j2"));
    assert_eq!(log.events(), ["audit:before"]);

    let handle = first_handle(&handles);
    let worker = std::thread::spawn(move || handle.complete(finish_with("from worker")));
    assert!(worker.join().unwrap());

    assert_eq!(log.events(), ["audit:before", "audit:after"]);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content_as_string().as_deref(), Some("from worker"));
}

#[test]
fn test_second_complete_is_rejected() {
    let handles = Handles::default();
    let dispatcher = deferred_dispatcher(&handles);
    let transport = transport();
    dispatcher.incoming(transport.clone(), strest(Method::GET, "/jobs/3", "j3"));

    let handle = first_handle(&handles);
    let again = handle.clone();
    assert!(handle.complete(finish_with("first")));
    assert!(!again.complete(finish_with("second")));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content_as_string().as_deref(), Some("first"));
}

/// Completes its own transaction before the action returns.
#[derive(Default)]
struct Eager;

impl Controller for Eager {
    fn handle_get(&mut self, ctx: &mut RequestContext) -> anyhow::Result<()> {
        let handle = ctx.transaction_handle();
        anyhow::ensure!(handle.complete(finish_with("eager")), "completion refused");
        Ok(())
    }
}

#[test]
fn test_completion_inside_the_action() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(
        ControllerDescriptor::of::<Eager>("eager")
            .route("/eager")
            .async_method(Method::GET),
    );

    let response = send_one(&dispatcher, strest(Method::GET, "/eager", "e1"));

    assert_eq!(response.status(), 200);
    assert_eq!(response.content_as_string().as_deref(), Some("eager"));
    assert_eq!(response.txn_status(), Some(TxnStatus::Complete));
}

#[test]
fn test_complete_after_disconnect_sends_nothing() {
    let handles = Handles::default();
    let dispatcher = deferred_dispatcher(&handles);
    let transport = transport();
    dispatcher.incoming(transport.clone(), strest(Method::GET, "/jobs/4", "j4"));

    assert!(dispatcher.disconnected(transport.id()));

    let handle = first_handle(&handles);
    assert!(!handle.is_connected());
    assert!(handle.complete(finish_with("too late")));
    assert_eq!(transport.sent_count(), 0);
    assert_eq!(dispatcher.connection_count(), 0);
}

#[test]
fn test_partials_then_complete() {
    let handles = Handles::default();
    let dispatcher = deferred_dispatcher(&handles);
    let transport = transport();
    dispatcher.incoming(transport.clone(), strest(Method::GET, "/jobs/5", "j5"));

    let handle = first_handle(&handles);
    for chunk in ["10%", "60%"] {
        let ack = handle
            .send_partial(|r| r.set_text("text/plain", chunk))
            .unwrap();
        assert!(ack.is_success());
    }
    assert!(handle.complete(finish_with("100%")));

    let sent = transport.sent();
    let statuses: Vec<_> = sent.iter().map(|r| r.txn_status()).collect();
    assert_eq!(
        statuses,
        [
            Some(TxnStatus::Continue),
            Some(TxnStatus::Continue),
            Some(TxnStatus::Complete)
        ]
    );
    assert!(sent.iter().all(|r| r.txn_id() == Some("j5")));
    assert_eq!(sent[1].content_as_string().as_deref(), Some("60%"));
}

#[test]
fn test_partials_refused_under_txn_accept_single() {
    let handles = Handles::default();
    let dispatcher = deferred_dispatcher(&handles);
    let transport = transport();
    let request =
        strest(Method::GET, "/jobs/7", "j7").with_header(HeaderName::TxnAccept, "single");
    dispatcher.incoming(transport.clone(), request);

    let handle = first_handle(&handles);
    assert!(handle
        .send_partial(|r| r.set_text("text/plain", "50%"))
        .is_none());
    assert!(handle.complete(finish_with("all")));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent
        .iter()
        .all(|r| r.txn_status() == Some(TxnStatus::Complete)));
}

#[test]
fn test_handle_from_failed_action_is_refused() {
    let handles = Handles::default();
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(deferred("/jobs/:id", &handles).async_method(Method::POST));
    let transport = transport();

    dispatcher.incoming(transport.clone(), strest(Method::POST, "/jobs/8", "j8"));

    assert_eq!(transport.sent()[0].status(), 500);
    let handle = first_handle(&handles);
    assert!(!handle.complete(finish_with("never")));
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn test_handle_from_synchronous_action_is_refused() {
    let handles = Handles::default();
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(stash("/stash", &handles));
    let transport = transport();

    dispatcher.incoming(transport.clone(), strest(Method::GET, "/stash", "s1"));

    assert_eq!(transport.sent_count(), 1);
    let handle = first_handle(&handles);
    assert!(!handle.complete(finish_with("never")));
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn test_synchronous_action_completing_its_own_handle() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(ControllerDescriptor::of::<Eager>("eager").route("/eager"));

    let response = send_one(&dispatcher, strest(Method::GET, "/eager", "e2"));

    assert_eq!(response.status(), 200);
    assert_eq!(response.content_as_string().as_deref(), Some("eager"));
}

#[test]
fn test_async_action_without_handle_completes_immediately() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(
        ControllerDescriptor::of::<Plain>("plain")
            .route("/plain")
            .async_method(Method::GET),
    );

    let response = send_one(&dispatcher, strest(Method::GET, "/plain", "p1"));

    assert_eq!(response.status(), 200);
    assert_eq!(response.content_as_string().as_deref(), Some("plain"));
}

#[test]
fn test_failing_completion_takes_error_path() {
    let handles = Handles::default();
    let dispatcher = Dispatcher::new();
    let log = EventLog::default();
    record(&dispatcher, "audit", &log);
    dispatcher.register_controller(deferred("/jobs/:id", &handles).filter("audit"));
    let transport = transport();
    dispatcher.incoming(transport.clone(), strest(Method::GET, "/jobs/6", "j6"));

    let handle = first_handle(&handles);
    assert!(handle.complete(|_ctx| anyhow::bail!("worker lost")));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status(), 500);
    assert_eq!(sent[0].txn_status(), Some(TxnStatus::Complete));
    assert_eq!(log.events(), ["audit:before", "audit:error(500)"]);
}

#[test]
fn test_many_parked_transactions_complete_in_any_order() {
    let handles = Handles::default();
    let dispatcher = deferred_dispatcher(&handles);
    let transport = transport();
    for i in 0..4 {
        dispatcher.incoming(
            transport.clone(),
            strest(Method::GET, &format!("/jobs/{i}"), &format!("m{i}")),
        );
    }
    let channel = dispatcher.connection(transport.id()).unwrap();
    assert_eq!(channel.in_flight_count(), 4);

    let parked: Vec<TransactionHandle> = handles.lock().unwrap().clone();
    let workers: Vec<_> = parked
        .into_iter()
        .rev()
        .map(|handle| std::thread::spawn(move || handle.complete(finish_with("ok"))))
        .collect();
    for worker in workers {
        assert!(worker.join().unwrap());
    }

    let mut txn_ids: Vec<String> = transport
        .sent()
        .iter()
        .filter_map(|r| r.txn_id().map(str::to_string))
        .collect();
    txn_ids.sort();
    assert_eq!(txn_ids, ["m0", "m1", "m2", "m3"]);
    assert_eq!(channel.in_flight_count(), 0);
}
