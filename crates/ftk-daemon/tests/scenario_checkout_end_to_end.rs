//! Scenario: Checkout confirmation end to end over HTTP
//!
//! GREEN when:
//! - `HttpOrderStore` drives a real daemon socket: create, stamped dispatch,
//!   lost race, re-fetch and retry.
//! - A confirmation session fed by the daemon's SSE stream flips to paid
//!   after the payment webhook and navigates to the tracking view once.

use std::sync::Arc;
use std::time::Duration;

use ftk_confirm::{
    spawn_session, ConfirmationTimings, NavigationCause, Phase, RecordingNavigator,
    SessionContext,
};
use ftk_daemon::{routes, state};
use ftk_order::{ActionKind, OrderError, OrderStatus, TransitionRequest};
use ftk_store::{HttpOrderStore, OrderStore};

async fn spawn_daemon() -> String {
    let app = routes::build_router(Arc::new(state::AppState::new()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn stamped_dispatch_over_http() {
    let base = spawn_daemon().await;
    let client = HttpOrderStore::new(&base, Duration::from_secs(2)).unwrap();

    let created = client.create("o1").await.unwrap();
    let ack = client
        .dispatch(&TransitionRequest::new("o1", ActionKind::Accept).expecting(created.updated_at_ms))
        .await
        .unwrap();
    let accepted = ack.order.unwrap();
    assert_eq!(accepted.status, OrderStatus::Accepted);

    // A second actor still holding the creation stamp loses the race.
    let err = client
        .dispatch(&TransitionRequest::new("o1", ActionKind::Cancel).expecting(created.updated_at_ms))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        OrderError::ConcurrencyConflict {
            order_id: "o1".into(),
            expected: created.updated_at_ms,
            actual: accepted.updated_at_ms,
        }
    );

    let fresh = client.get("o1").await.unwrap();
    let ack = client
        .dispatch(&TransitionRequest::new("o1", ActionKind::Start).expecting(fresh.updated_at_ms))
        .await
        .unwrap();
    assert_eq!(ack.order.unwrap().status, OrderStatus::Preparing);

    let err = client
        .dispatch(&TransitionRequest::new("o1", ActionKind::Handoff))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { from: OrderStatus::Preparing, .. }));
}

#[tokio::test]
async fn payment_push_completes_the_checkout_session() {
    let base = spawn_daemon().await;
    let client = HttpOrderStore::new(&base, Duration::from_secs(2)).unwrap();
    client.create("o1").await.unwrap();

    let feed = client.subscribe("o1").await.unwrap();
    let nav = Arc::new(RecordingNavigator::new());
    let timings = ConfirmationTimings::from_millis(100, 10_000, 200, 200, 20);
    let handle = spawn_session(
        SessionContext::new("o1").with_user("uid-1"),
        feed,
        timings,
        nav.clone(),
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.current().phase, Phase::Pending);

    client.mark_paid("o1").await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("session did not finish")
        .unwrap();
    assert_eq!(outcome.phase, Phase::Completed);
    assert!(outcome.state.is_paid());
    assert_eq!(nav.count(), 1);
    assert_eq!(nav.navigations()[0].cause, NavigationCause::Completed);
    assert_eq!(nav.navigations()[0].route, "/orders/o1/track");
}
