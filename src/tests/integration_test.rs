use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async;

use super::{spawn_server, wait_for_subscribers};
use crate::broker::Broker;
use crate::client::{Client, HttpClient, Options, Shard};

#[tokio::test]
async fn integration_proxy_fans_out_across_cluster() {
    let first = Arc::new(Broker::new());
    let second = Arc::new(Broker::new());
    let cluster = vec![
        spawn_server(first.clone()).await,
        spawn_server(second.clone()).await,
    ];

    let client = HttpClient::new(Options::default().with_servers(cluster));
    let proxy = Arc::new(Broker::proxy(Arc::new(client)));
    let front = spawn_server(proxy.clone()).await;

    let url = format!("{}/sub?topic=test", front.replacen("http", "ws", 1));
    let (mut ws, _) = connect_async(url).await.expect("subscriber connect");

    // The proxy holds one stream per backend.
    wait_for_subscribers(&first, "test", 1).await;
    wait_for_subscribers(&second, "test", 1).await;

    let rsp = reqwest::Client::new()
        .post(format!("{front}/pub?topic=test"))
        .body("hello world")
        .send()
        .await
        .unwrap();
    assert!(rsp.status().is_success());

    // Published to both backends, each forwarding back through the proxy.
    for _ in 0..2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("subscriber did not receive the published message")
            .unwrap()
            .unwrap();
        assert_eq!(frame.into_data(), Bytes::from_static(b"hello world"));
    }

    drop(ws);
    wait_for_subscribers(&first, "test", 0).await;
    wait_for_subscribers(&second, "test", 0).await;

    proxy.close().await.unwrap();
}

#[tokio::test]
async fn integration_shard_selector_routes_topic_to_one_backend() {
    let brokers = [Arc::new(Broker::new()), Arc::new(Broker::new())];
    let mut servers = Vec::new();
    for broker in &brokers {
        servers.push(spawn_server(broker.clone()).await);
    }

    let client = HttpClient::new(
        Options::default()
            .with_servers(servers)
            .with_selector(Arc::new(Shard::default())),
    );

    let mut sub = client.subscribe("orders").await.unwrap();
    let owner = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(i) = brokers.iter().position(|b| b.subscriber_count("orders") == 1) {
                return i;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(brokers[1 - owner].subscriber_count("orders"), 0);

    client
        .publish("orders", Bytes::from_static(b"order-1"))
        .await
        .unwrap();
    let payload = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload, Bytes::from_static(b"order-1"));

    client.close().await.unwrap();
}
