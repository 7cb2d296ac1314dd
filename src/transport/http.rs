//! HTTP transport
//!
//! Translates requests into broker calls:
//! - `POST /pub?topic=` publishes the raw request body
//! - `GET /sub?topic=` upgrades to a WebSocket and streams every payload of
//!   the topic as a binary frame until the peer goes away or a write fails
//!
//! Every request is logged with its remote address, method and URI.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::broker::Broker;
use crate::client::Subscription;

#[derive(Debug, Default, Deserialize)]
pub struct TopicQuery {
    #[serde(default)]
    pub topic: String,
}

/// Builds the router (separated for testing).
pub fn router(broker: Arc<Broker>) -> Router {
    Router::new()
        .route("/pub", post(publish))
        .route("/sub", get(subscribe))
        .layer(middleware::from_fn(access_log))
        .with_state(broker)
}

/// Serves `broker` on an already bound listener until the server fails.
pub async fn serve(listener: TcpListener, broker: Arc<Broker>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    if broker.is_proxy() {
        info!("proxy enabled");
    }
    info!(%addr, "mq listening");

    axum::serve(
        listener,
        router(broker).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

async fn access_log(req: Request, next: Next) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    info!(%remote, method = %req.method(), uri = %req.uri(), "request");
    next.run(req).await
}

async fn publish(
    State(broker): State<Arc<Broker>>,
    Query(query): Query<TopicQuery>,
    body: Bytes,
) -> Response {
    match broker.publish(&query.topic, body).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            error!(topic = %query.topic, error = %e, "publish failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Pub error").into_response()
        }
    }
}

async fn subscribe(
    State(broker): State<Arc<Broker>>,
    Query(query): Query<TopicQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        let subscription = match broker.subscribe(&query.topic).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(topic = %query.topic, error = %e, "failed to subscribe");
                return;
            }
        };
        stream_events(socket, subscription, &broker).await;
    })
}

async fn stream_events(mut socket: WebSocket, mut subscription: Subscription, broker: &Broker) {
    if let Some(e) = subscription.take_partial_error() {
        warn!(topic = subscription.topic(), error = %e, "subscribed with partial failure");
    }

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(payload) = event else { break };
                if let Err(e) = socket.send(Message::Binary(payload.to_vec())).await {
                    warn!(topic = subscription.topic(), error = %e, "error sending event");
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Err(e) = broker.unsubscribe(&subscription).await {
        warn!(topic = subscription.topic(), error = %e, "failed to unsubscribe");
    }
}
