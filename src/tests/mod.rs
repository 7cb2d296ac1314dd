//! Helpers shared by the tests that need real listeners.

mod integration_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::net::TcpListener;

use crate::broker::Broker;

/// Serves `broker` on an ephemeral loopback port and returns its base URL.
pub(crate) async fn spawn_server(broker: Arc<Broker>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(crate::transport::serve(listener, broker));
    format!("http://{addr}")
}

/// A backend whose `/pub` always answers 500 and counts how often it was hit.
/// It has no `/sub` route, so subscribing to it fails as well.
pub(crate) async fn spawn_failing_server(hits: Arc<AtomicUsize>) -> String {
    async fn fail(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
        hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::INTERNAL_SERVER_ERROR
    }

    let app = Router::new().route("/pub", post(fail)).with_state(hits);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// An address nothing listens on.
pub(crate) async fn unreachable_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Waits until `broker` has exactly `count` queues on `topic`.
pub(crate) async fn wait_for_subscribers(broker: &Broker, topic: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.subscriber_count(topic) != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {count} subscribers on {topic}, found {}",
            broker.subscriber_count(topic)
        )
    });
}
