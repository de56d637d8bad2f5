//! End-to-end routing behavior against in-memory doubles.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MemoryRouteStore, RecordingTransport, TransportEvent};
use weft::dispatch::{DispatchError, Dispatcher, Transport};
use weft::routing::{RouteOutcome, Router};

fn router_with(
    routes: &[&str],
    transport: Arc<RecordingTransport>,
    allow_shell_calls: bool,
) -> Router {
    let store = Arc::new(MemoryRouteStore::with_routes(routes));
    let dispatcher = Dispatcher::new(
        transport as Arc<dyn Transport>,
        allow_shell_calls,
        Some(Duration::from_secs(5)),
    );
    Router::new(store, dispatcher)
}

#[tokio::test]
async fn matching_routes_publish_and_write_field() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(
        &["a/b -> c/d", "a/b >> mykey.field1"],
        Arc::clone(&transport),
        false,
    );

    let outcomes = router.route_message("a/b", b"hello", &[]).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(RouteOutcome::is_dispatched));

    let events = transport.events();
    assert!(events.contains(&TransportEvent::Publish {
        channel: "c/d".to_string(),
        payload: "hello".to_string(),
    }));
    assert!(events.contains(&TransportEvent::SetField {
        key: "mykey".to_string(),
        field: "field1".to_string(),
        value: "hello".to_string(),
    }));
}

#[tokio::test]
async fn malformed_route_never_blocks_the_others() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(
        &["a/b -> c/d", "broken ~~ route", "a/b >> mykey"],
        Arc::clone(&transport),
        false,
    );

    let outcomes = router.route_message("a/b", b"hello", &[]).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    let dispatched = outcomes.iter().filter(|o| o.is_dispatched()).count();
    let invalid = outcomes
        .iter()
        .filter(|o| matches!(o, RouteOutcome::Invalid { .. }))
        .count();
    assert_eq!(dispatched, 2);
    assert_eq!(invalid, 1);
    assert_eq!(transport.events().len(), 2);
}

#[tokio::test]
async fn shell_calls_are_refused_by_policy() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(&["x -- rm -rf /"], Arc::clone(&transport), false);

    let outcomes = router.route_message("x", b"payload", &[]).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        RouteOutcome::DispatchFailed { error, .. } => {
            assert!(matches!(error, DispatchError::ShellCallsDisabled));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn empty_store_yields_empty_outcomes() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(&[], transport, false);

    let outcomes = router.route_message("a/b", b"hello", &[]).await.unwrap();
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn unmatched_source_is_reported_not_dispatched() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(&["other -> c/d"], Arc::clone(&transport), false);

    let outcomes = router.route_message("a/b", b"hello", &[]).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], RouteOutcome::NotMatched { .. }));
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn munge_template_rewrites_the_payload() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(
        &["a/b -> c/d munge $channel said $message"],
        Arc::clone(&transport),
        false,
    );

    router.route_message("a/b", b"hello", &[]).await.unwrap();

    assert_eq!(
        transport.events(),
        vec![TransportEvent::Publish {
            channel: "c/d".to_string(),
            payload: "a/b said hello".to_string(),
        }]
    );
}

#[tokio::test]
async fn caller_context_variables_render_in_templates() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(
        &["a/b >> conn munge $DB_HOST:$DB_PORT"],
        Arc::clone(&transport),
        false,
    );

    let extra = vec![
        ("$DB_HOST".to_string(), "10.0.0.2".to_string()),
        ("$DB_PORT".to_string(), "6379".to_string()),
    ];
    router.route_message("a/b", b"ignored", &extra).await.unwrap();

    assert_eq!(
        transport.events(),
        vec![TransportEvent::Set {
            key: "conn".to_string(),
            value: "10.0.0.2:6379".to_string(),
        }]
    );
}

#[tokio::test]
async fn store_failure_skips_the_cycle() {
    let store = Arc::new(MemoryRouteStore::with_routes(&["a/b -> c/d"]));
    store.set_failing(true);
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = Dispatcher::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        false,
        None,
    );
    let router = Router::new(store, dispatcher);

    assert!(router.route_message("a/b", b"hello", &[]).await.is_err());
    assert!(transport.events().is_empty());
}

#[tokio::test]
async fn disabled_lines_produce_no_outcome() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(
        &["# a/b -> c/d", "a/b -> kept"],
        Arc::clone(&transport),
        false,
    );

    let outcomes = router.route_message("a/b", b"hello", &[]).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].is_dispatched());
}

#[tokio::test]
async fn transport_failure_is_contained_per_route() {
    let transport = Arc::new(RecordingTransport::failing());
    let router = router_with(&["a/b -> c/d"], transport, false);

    let outcomes = router.route_message("a/b", b"hello", &[]).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        RouteOutcome::DispatchFailed { error, .. } => {
            assert!(matches!(error, DispatchError::Transport(_)));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn blocking_command_exit_status_is_reported() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(&["x -- true", "x -- false"], transport, true);

    let outcomes = router.route_message("x", b"payload", &[]).await.unwrap();

    let dispatched = outcomes.iter().filter(|o| o.is_dispatched()).count();
    let status_failures = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o,
                RouteOutcome::DispatchFailed {
                    error: DispatchError::CommandStatus { status: 1, .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(dispatched, 1);
    assert_eq!(status_failures, 1);
}

#[tokio::test]
async fn nonblocking_command_succeeds_once_spawned() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(&["x -- &sleep 0"], transport, true);

    let outcomes = router.route_message("x", b"payload", &[]).await.unwrap();
    assert!(outcomes[0].is_dispatched());
}

#[tokio::test]
async fn missing_program_is_a_spawn_failure() {
    let transport = Arc::new(RecordingTransport::new());
    let router = router_with(
        &["x -- definitely-not-a-real-program-9f2c"],
        transport,
        true,
    );

    let outcomes = router.route_message("x", b"payload", &[]).await.unwrap();
    match &outcomes[0] {
        RouteOutcome::DispatchFailed { error, .. } => {
            assert!(matches!(error, DispatchError::Spawn { .. }));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
