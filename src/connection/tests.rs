use super::*;
use crate::ids::RequestId;
use crate::packet::{StrestRequest, StrestResponse, TxnStatus};
use http::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn channel() -> (Arc<MemoryTransport>, ConnectionChannel) {
    let transport = Arc::new(MemoryTransport::new());
    let channel = ConnectionChannel::new(transport.clone());
    (transport, channel)
}

#[test]
fn test_send_writes_to_transport() {
    let (transport, channel) = channel();
    assert_eq!(channel.id(), transport.id());
    let ack = channel.send(&StrestResponse::new()).unwrap();
    assert!(ack.is_success());
    assert_eq!(transport.sent_count(), 1);
}

#[test]
fn test_send_on_closed_transport_returns_none() {
    let (transport, channel) = channel();
    transport.drop_connection();
    assert!(!channel.is_connected());
    assert!(channel.send(&StrestResponse::new()).is_none());
    assert_eq!(transport.sent_count(), 0);
}

#[test]
fn test_failed_write_is_reported_in_ack() {
    let (transport, channel) = channel();
    transport.fail_writes(true);
    let ack = channel.send(&StrestResponse::new()).unwrap();
    assert!(!ack.is_success());
    assert_eq!(ack.error().unwrap().kind(), std::io::ErrorKind::BrokenPipe);
}

#[test]
fn test_disconnect_callbacks_run_exactly_once() {
    let (_transport, channel) = channel();
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let count = count.clone();
        channel.on_disconnect(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
    }

    channel.disconnected();
    channel.disconnected();
    channel.cleanup();
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert!(!channel.is_connected());
}

#[test]
fn test_callback_registered_after_disconnect_runs_immediately() {
    let (_transport, channel) = channel();
    channel.disconnected();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    channel.on_disconnect(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_in_flight_tracking() {
    let (_transport, channel) = channel();
    let first = RequestId::new();
    let second = RequestId::new();
    channel.incoming(first, &StrestRequest::strest(Method::GET, "/a").with_header("Txn-Id", "1"));
    channel.incoming(second, &StrestRequest::strest(Method::GET, "/b").with_header("Txn-Id", "2"));
    assert_eq!(channel.in_flight_count(), 2);

    let done = channel.complete(first).unwrap();
    assert_eq!(done.txn_id.as_deref(), Some("1"));
    assert_eq!(done.path, "/a");
    assert_eq!(channel.in_flight_txn_ids(), vec!["2".to_string()]);

    channel.cleanup();
    assert_eq!(channel.in_flight_count(), 0);
}

#[test]
fn test_complete_response_ends_open_transaction_with_same_id() {
    let (_transport, channel) = channel();
    let feed = StrestRequest::strest(Method::GET, "/feed").with_header("Txn-Id", "s");
    let other = StrestRequest::strest(Method::GET, "/other").with_header("Txn-Id", "o");
    channel.incoming(RequestId::new(), &feed);
    channel.incoming(RequestId::new(), &other);

    let mut open = StrestResponse::new();
    open.set_txn_id("s");
    open.set_txn_status(TxnStatus::Open);
    channel.send(&open).unwrap();
    channel.send(&StrestResponse::partial(Some("s"))).unwrap();
    assert_eq!(channel.in_flight_count(), 2);

    let mut done = StrestResponse::new();
    done.set_txn_id("s");
    done.set_txn_status(TxnStatus::Complete);
    channel.send(&done).unwrap();
    assert_eq!(channel.in_flight_txn_ids(), vec!["o".to_string()]);
    assert_eq!(channel.complete_txn("missing"), 0);
}

#[test]
fn test_cleanup_does_not_close_transport() {
    let (transport, channel) = channel();
    channel.cleanup();
    assert_eq!(transport.close_calls(), 0);
    assert!(transport.is_open());
    channel.close();
    assert_eq!(transport.close_calls(), 1);
}
