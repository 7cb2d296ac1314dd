//! Subscriber connection
//!
//! One WebSocket link to one backend for one topic. Dialing starts two
//! tasks on the connection's tracker:
//! - a watcher holding the write half, which sends a close frame once the
//!   exit token fires
//! - a reader forwarding every data frame into the shared output queue,
//!   racing each forward against the exit token so a full queue cannot
//!   pin it
//!
//! The reader stops on a transport error, a close frame, a dropped output
//! queue or the exit token, and fires the token itself on the way out so
//! the watcher follows. `close` waits on the tracker, so no task of the
//! connection outlives it.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::{MqError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug)]
pub struct SubscriberConnection {
    id: Uuid,
    topic: String,
    addr: String,
    exit: CancellationToken,
    tasks: TaskTracker,
    closed: AtomicBool,
}

impl SubscriberConnection {
    /// Opens the stream for `topic` on `addr` and starts forwarding frames
    /// into `out`.
    pub async fn dial(addr: &str, topic: &str, out: mpsc::Sender<Bytes>) -> Result<Self> {
        let url = subscribe_url(addr, topic)?;
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|source| MqError::WebSocket {
                addr: addr.to_string(),
                source: Box::new(source),
            })?;
        let (sink, stream) = ws.split();

        let conn = Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            addr: addr.to_string(),
            exit: CancellationToken::new(),
            tasks: TaskTracker::new(),
            closed: AtomicBool::new(false),
        };

        conn.tasks.spawn(watch(sink, conn.exit.clone()));
        conn.tasks.spawn(read_frames(
            stream,
            out,
            conn.exit.clone(),
            conn.id,
            conn.topic.clone(),
        ));
        conn.tasks.close();

        debug!(connection = %conn.id, addr, topic, "subscriber connection established");
        Ok(conn)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// True once the reader and watcher have both exited.
    pub fn is_finished(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Idempotent. The first caller fires the exit token and waits for both
    /// tasks to exit; later callers return immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.exit.cancel();
        self.tasks.wait().await;
        debug!(connection = %self.id, addr = %self.addr, "subscriber connection closed");
    }
}

async fn watch(mut sink: SplitSink<WsStream, WsMessage>, exit: CancellationToken) {
    exit.cancelled().await;
    let _ = sink.close().await;
}

async fn read_frames(
    mut stream: SplitStream<WsStream>,
    out: mpsc::Sender<Bytes>,
    exit: CancellationToken,
    id: Uuid,
    topic: String,
) {
    loop {
        let frame = tokio::select! {
            _ = exit.cancelled() => break,
            frame = stream.next() => frame,
        };

        let payload = match frame {
            Some(Ok(msg)) if msg.is_close() => break,
            Some(Ok(msg)) if msg.is_binary() || msg.is_text() => msg.into_data(),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(connection = %id, topic = %topic, error = %e, "subscriber stream failed");
                break;
            }
            None => break,
        };

        tokio::select! {
            sent = out.send(payload) => {
                if sent.is_err() {
                    break;
                }
            }
            _ = exit.cancelled() => break,
        }
    }

    exit.cancel();
    debug!(connection = %id, topic = %topic, "subscriber reader exited");
}

/// `http` addresses are dialed as `ws`, `https` as `wss`.
pub fn subscribe_url(addr: &str, topic: &str) -> Result<String> {
    let ws = match addr.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => addr.to_string(),
    };
    let mut url = reqwest::Url::parse(&format!("{}/sub", ws.trim_end_matches('/')))
        .map_err(|_| MqError::InvalidAddress(addr.to_string()))?;
    url.query_pairs_mut().append_pair("topic", topic);
    Ok(url.into())
}
