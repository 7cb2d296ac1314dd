use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Broker;
use crate::client::{Client, HttpClient, Options};
use crate::tests::{spawn_server, wait_for_subscribers};

fn ws_url(base: &str, topic: &str) -> String {
    format!("{}/sub?topic={topic}", base.replacen("http", "ws", 1))
}

#[tokio::test]
async fn test_publish_without_subscribers_returns_ok() {
    let broker = Arc::new(Broker::new());
    let base = spawn_server(broker).await;

    let rsp = reqwest::Client::new()
        .post(format!("{base}/pub?topic=nobody"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_subscriber_receives_published_body_as_binary_frame() {
    let broker = Arc::new(Broker::new());
    let base = spawn_server(broker.clone()).await;

    let (mut ws, _) = connect_async(ws_url(&base, "x")).await.unwrap();
    wait_for_subscribers(&broker, "x", 1).await;

    let rsp = reqwest::Client::new()
        .post(format!("{base}/pub?topic=x"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert!(rsp.status().is_success());

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(frame.is_binary());
    assert_eq!(frame.into_data(), Bytes::from("hello"));
}

#[tokio::test]
async fn test_disconnect_unsubscribes() {
    let broker = Arc::new(Broker::new());
    let base = spawn_server(broker.clone()).await;

    let (mut ws, _) = connect_async(ws_url(&base, "x")).await.unwrap();
    wait_for_subscribers(&broker, "x", 1).await;

    ws.close(None).await.unwrap();
    wait_for_subscribers(&broker, "x", 0).await;
}

#[tokio::test]
async fn test_client_messages_are_ignored() {
    let broker = Arc::new(Broker::new());
    let base = spawn_server(broker.clone()).await;

    let (mut ws, _) = connect_async(ws_url(&base, "x")).await.unwrap();
    wait_for_subscribers(&broker, "x", 1).await;

    ws.send(WsMessage::text("ping from client")).await.unwrap();
    broker.publish("x", Bytes::from_static(b"after")).await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame.into_data(), Bytes::from_static(b"after"));
    assert_eq!(broker.subscriber_count("x"), 1);
}

#[tokio::test]
async fn test_publish_failure_returns_server_error() {
    let client = HttpClient::new(Options::default().with_servers(["127.0.0.1:1"]));
    client.close().await.unwrap();
    let broker = Arc::new(Broker::proxy(Arc::new(client)));
    let base = spawn_server(broker).await;

    let rsp = reqwest::Client::new()
        .post(format!("{base}/pub?topic=x"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(rsp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rsp.text().await.unwrap(), "Pub error");
}

#[tokio::test]
async fn test_missing_topic_uses_empty_topic() {
    let broker = Arc::new(Broker::new());
    let base = spawn_server(broker.clone()).await;

    let (mut ws, _) = connect_async(format!("{}/sub", base.replacen("http", "ws", 1)))
        .await
        .unwrap();
    wait_for_subscribers(&broker, "", 1).await;

    let rsp = reqwest::Client::new()
        .post(format!("{base}/pub"))
        .body("untitled")
        .send()
        .await
        .unwrap();
    assert!(rsp.status().is_success());

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame.into_data(), Bytes::from_static(b"untitled"));
}
