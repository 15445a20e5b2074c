//! Routing as seen through the dispatcher, plus concurrent lookups on a
//! shared table.

mod common;

use common::*;
use http::Method;
use std::sync::Arc;
use strest::controller::ControllerDescriptor;
use strest::controllers::HelloWorld;
use strest::dispatcher::Dispatcher;
use strest::router::RouteTable;

#[test]
fn test_literal_route_beats_parameter_route() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(HelloWorld::descriptor());
    dispatcher.register_controller(ControllerDescriptor::of::<Plain>("plain").route("/hello/plain"));

    let literal = send_one(&dispatcher, strest(Method::GET, "/hello/plain", "1"));
    assert_eq!(literal.content_as_string().as_deref(), Some("plain"));

    let param = send_one(&dispatcher, strest(Method::GET, "/hello/other", "2"));
    assert_eq!(param.content_as_string().as_deref(), Some("Hello OTHER!"));
}

#[test]
fn test_controller_with_several_routes() {
    let dispatcher = Dispatcher::new();
    dispatcher.register_controller(
        ControllerDescriptor::of::<EchoParams>("echo")
            .route("/users/:user_id")
            .route("/users/:user_id/posts/:post_id"),
    );
    assert_eq!(dispatcher.routes().len(), 2);

    let response = send_one(&dispatcher, strest(Method::GET, "/users/u1/posts/p%202", "1"));
    let params: serde_json::Value = response.json_content().unwrap();
    assert_eq!(params["user_id"], "u1");
    assert_eq!(params["post_id"], "p 2");
}

#[test]
fn test_route_added_after_traffic_is_visible() {
    let dispatcher = Dispatcher::new();
    assert_eq!(send_one(&dispatcher, strest(Method::GET, "/late", "1")).status(), 404);

    dispatcher.add_route(
        "/late",
        Arc::new(ControllerDescriptor::of::<Plain>("plain")),
    );
    assert_eq!(send_one(&dispatcher, strest(Method::GET, "/late", "2")).status(), 200);
}

#[test]
fn test_concurrent_lookups() {
    let table: Arc<RouteTable<&'static str>> = Arc::new(RouteTable::new());
    table.add_route("/a/:x", Arc::new("param"));
    table.add_route("/a/b", Arc::new("literal"));

    let readers: Vec<_> = (0..8)
        .map(|i| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let found = table.find("/a/b").unwrap();
                    assert_eq!(*found.handler, "literal");
                    let found = table.find(&format!("/a/{i}")).unwrap();
                    assert_eq!(*found.handler, "param");
                    assert_eq!(found.get_path_param("x"), Some(i.to_string().as_str()));
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
}
