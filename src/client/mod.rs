//! The `client` module talks to one or more remote brokers over HTTP and
//! WebSocket.
//!
//! [`HttpClient`] fans every publish out to the servers chosen by its
//! [`Selector`], merges the streams of every backend it subscribed to into
//! one [`Subscription`], and optionally refreshes its server list from a
//! [`Resolver`] in the background. The [`Client`] trait is the surface the
//! broker uses when running as a cluster proxy.

pub mod connection;
pub mod http_client;
pub mod options;
pub mod resolver;
pub mod selector;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use uuid::Uuid;

use crate::utils::{MqError, Result};

pub use http_client::HttpClient;
pub use options::Options;
pub use resolver::{DnsResolver, Resolver};
pub use selector::{SelectAll, Selector, Shard};

/// Identity of one subscribe call. Two subscriptions never share an id,
/// even when they are for the same topic.
pub type SubscriptionId = Uuid;

/// Publish/subscribe operations shared by the local broker and the cluster
/// client.
#[async_trait]
pub trait Client: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Opens a subscription. A returned subscription may still carry a
    /// [`Subscription::partial_error`] when some backends could not be reached.
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()>;

    /// Idempotent. Every background task has exited once this returns.
    async fn close(&self) -> Result<()>;
}

/// The receiving side of a subscribe call.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    receiver: mpsc::Receiver<Bytes>,
    partial_error: Option<MqError>,
}

impl Subscription {
    pub(crate) fn new(topic: &str, receiver: mpsc::Receiver<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            receiver,
            partial_error: None,
        }
    }

    pub(crate) fn with_partial_error(mut self, error: Option<MqError>) -> Self {
        self.partial_error = error;
        self
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Error left by the last backend attempted, if it could not be reached.
    /// Messages from the backends that did connect are still delivered.
    pub fn partial_error(&self) -> Option<&MqError> {
        self.partial_error.as_ref()
    }

    pub fn take_partial_error(&mut self) -> Option<MqError> {
        self.partial_error.take()
    }

    /// Waits for the next payload. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> std::result::Result<Bytes, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn capacity(&self) -> usize {
        self.receiver.max_capacity()
    }
}
