//! Transport tests: cache busting, status handling, and exactly-once completion.

extern crate nsload;

use nsload::runner::error::FetchError;
use nsload::runner::namespace::Namespace;
use nsload::runner::transport::{
    is_success, normalize_status, Completion, CompletionLatch, Dispatch, FetchMode,
    MemoryChannel, Response, Transport,
};

fn ns(raw: &str) -> Namespace {
    Namespace::parse(raw).unwrap()
}

fn in_flight(dispatch: Dispatch) -> nsload::runner::transport::TicketId {
    match dispatch {
        Dispatch::InFlight(id) => id,
        other => panic!("expected an in-flight fetch, got {:?}", other),
    }
}

#[test]
fn test_status_normalization() {
    assert_eq!(normalize_status(1223), 204);
    assert_eq!(normalize_status(404), 404);
    assert!(is_success(200));
    assert!(is_success(1223));
    assert!(is_success(299));
    assert!(!is_success(300));
    assert!(!is_success(199));
}

#[test]
fn test_latch_fires_once() {
    let mut latch = CompletionLatch::new();
    assert!(!latch.is_fired());
    assert!(latch.fire());
    assert!(!latch.fire());
    assert!(latch.is_fired());
}

#[test]
fn test_blocking_fetch_completes_inline() {
    let channel = MemoryChannel::new();
    channel.insert("src/A.js", "define A;");
    let mut transport = Transport::new(channel.clone());

    match transport.fetch(ns("A"), "src/A.js", FetchMode::Blocking) {
        Dispatch::Completed(Completion::Loaded { key, url, body }) => {
            assert_eq!(key, ns("A"));
            assert_eq!(url, "src/A.js");
            assert_eq!(body, "define A;");
        }
        other => panic!("unexpected dispatch {:?}", other),
    }
    assert_eq!(transport.in_flight(), 0);
    assert_eq!(channel.request_count("src/A.js"), 1);
}

#[test]
fn test_every_request_carries_a_fresh_token() {
    let channel = MemoryChannel::new();
    channel.insert("src/A.js", "");
    let mut transport = Transport::new(channel.clone());

    transport.fetch(ns("A"), "src/A.js", FetchMode::Blocking);
    transport.fetch(ns("A"), "src/A.js", FetchMode::Blocking);

    let requests = channel.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        let token = request
            .strip_prefix("src/A.js?nocache=")
            .expect("missing cache-busting token");
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert_ne!(requests[0], requests[1]);
}

#[test]
fn test_token_joins_an_existing_query() {
    let channel = MemoryChannel::new();
    let mut transport = Transport::new(channel.clone());

    transport.fetch(ns("x/y.js"), "src/x/y.js?v=3", FetchMode::Blocking);
    assert!(channel.requests()[0].starts_with("src/x/y.js?v=3&nocache="));
}

#[test]
fn test_non_success_status_fails_in_both_modes() {
    let channel = MemoryChannel::new();
    channel.insert_response("src/Boom.js", Response::with_status(500));
    let mut transport = Transport::new(channel.clone());

    match transport.fetch(ns("Boom"), "src/Boom.js", FetchMode::Blocking) {
        Dispatch::Completed(Completion::Failed { error, .. }) => {
            assert_eq!(error, FetchError::Status(500))
        }
        other => panic!("unexpected dispatch {:?}", other),
    }

    let id = in_flight(transport.fetch(ns("Missing"), "src/Missing.js", FetchMode::NonBlocking));
    match transport.notify(id) {
        Some(Completion::Failed { key, error, .. }) => {
            assert_eq!(key, ns("Missing"));
            assert_eq!(error, FetchError::Status(404));
        }
        other => panic!("unexpected completion {:?}", other),
    }
}

#[test]
fn test_quirky_status_counts_as_success() {
    let channel = MemoryChannel::new();
    channel.insert_response(
        "src/Empty.js",
        Response {
            status: 1223,
            body: String::new(),
        },
    );
    let mut transport = Transport::new(channel);

    let dispatch = transport.fetch(ns("Empty"), "src/Empty.js", FetchMode::Blocking);
    assert!(matches!(dispatch, Dispatch::Completed(Completion::Loaded { .. })));
}

#[test]
fn test_duplicate_signals_complete_once() {
    let channel = MemoryChannel::new();
    channel.insert("src/A.js", "define A;");
    let mut transport = Transport::new(channel.clone());

    let id = in_flight(transport.fetch(ns("A"), "src/A.js", FetchMode::NonBlocking));
    assert_eq!(transport.in_flight(), 1);
    assert_eq!(channel.request_count("src/A.js"), 0);

    assert!(transport.notify(id).is_some());
    assert!(transport.notify(id).is_none());
    assert!(transport.poll().is_none());
    assert_eq!(transport.in_flight(), 0);
    assert_eq!(channel.request_count("src/A.js"), 1);
}

#[test]
fn test_poll_skips_held_resources() {
    let channel = MemoryChannel::new();
    channel.insert("src/Slow.js", "define Slow;");
    channel.insert("src/Fast.js", "define Fast;");
    channel.hold("src/Slow.js");
    let mut transport = Transport::new(channel.clone());

    transport.fetch(ns("Slow"), "src/Slow.js", FetchMode::NonBlocking);
    transport.fetch(ns("Fast"), "src/Fast.js", FetchMode::NonBlocking);

    let first = transport.poll().unwrap();
    assert_eq!(first.key(), &ns("Fast"));
    assert!(transport.poll().is_none());
    assert_eq!(transport.in_flight_urls(), vec!["src/Slow.js"]);

    channel.release("src/Slow.js");
    let second = transport.poll().unwrap();
    assert_eq!(second.key(), &ns("Slow"));
    assert_eq!(transport.in_flight(), 0);
}
