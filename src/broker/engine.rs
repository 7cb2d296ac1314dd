//! Broker engine
//!
//! The broker either serves topics itself or forwards every call to a
//! cluster [`Client`]:
//! - standalone: subscribers get a bounded queue registered in the
//!   [`TopicRegistry`]; publish snapshots the topic's queues and hands
//!   delivery to a background task, returning before anything is delivered
//! - proxy: publish, subscribe and unsubscribe go straight to the client
//!
//! Concurrency notes:
//! - The registry lock is only held to read or swap a topic's queue list,
//!   never while delivering, so a stalled subscriber cannot slow down the
//!   publisher, other subscribers, or registration.
//! - Each publish runs its own delivery task. Two concurrent publishes to
//!   one topic can therefore reach a subscriber in either order.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use super::fanout;
use super::topic::{SubscriberQueue, TopicRegistry};
use crate::client::{Client, Subscription};
use crate::utils::Result;

/// Pending payloads a local subscriber queue holds before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Topic broker, standalone or proxying to a cluster.
pub struct Broker {
    backend: Backend,
}

enum Backend {
    Local {
        registry: TopicRegistry,
        deliveries: TaskTracker,
        queue_capacity: usize,
    },
    Proxy(Arc<dyn Client>),
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// A standalone broker with the default queue capacity.
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// A standalone broker whose subscriber queues hold `queue_capacity`
    /// payloads. Zero is raised to one.
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            backend: Backend::Local {
                registry: TopicRegistry::new(),
                deliveries: TaskTracker::new(),
                queue_capacity: queue_capacity.max(1),
            },
        }
    }

    /// A broker that forwards everything to `client`.
    pub fn proxy(client: Arc<dyn Client>) -> Self {
        Self {
            backend: Backend::Proxy(client),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.backend, Backend::Proxy(_))
    }

    /// Publishes `payload` to `topic`. With no local subscribers the
    /// message is dropped and the call still succeeds.
    pub async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        match &self.backend {
            Backend::Proxy(client) => client.publish(topic, payload).await,
            Backend::Local {
                registry,
                deliveries,
                ..
            } => {
                let Some(subscribers) = registry.snapshot(topic) else {
                    return Ok(());
                };
                fanout::spawn_delivery(deliveries, topic.to_string(), subscribers, payload);
                Ok(())
            }
        }
    }

    /// Registers a new subscriber queue for `topic`.
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        match &self.backend {
            Backend::Proxy(client) => client.subscribe(topic).await,
            Backend::Local {
                registry,
                queue_capacity,
                ..
            } => {
                let (tx, rx) = mpsc::channel(*queue_capacity);
                let subscription = Subscription::new(topic, rx);
                registry.register(
                    topic,
                    SubscriberQueue {
                        id: subscription.id(),
                        sender: tx,
                    },
                );
                debug!(topic, subscription = %subscription.id(), "subscriber registered");
                Ok(subscription)
            }
        }
    }

    /// Removes `subscription`. Unknown subscriptions are ignored.
    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        match &self.backend {
            Backend::Proxy(client) => client.unsubscribe(subscription).await,
            Backend::Local { registry, .. } => {
                if registry.deregister(subscription.topic(), &subscription.id()) {
                    debug!(
                        topic = subscription.topic(),
                        subscription = %subscription.id(),
                        "subscriber removed"
                    );
                }
                Ok(())
            }
        }
    }

    /// Number of local queues registered for `topic`. Always zero for a proxy.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        match &self.backend {
            Backend::Local { registry, .. } => registry.subscriber_count(topic),
            Backend::Proxy(_) => 0,
        }
    }

    /// Closes the cluster client, or waits for in-flight local deliveries.
    pub async fn close(&self) -> Result<()> {
        match &self.backend {
            Backend::Proxy(client) => client.close().await,
            Backend::Local { deliveries, .. } => {
                deliveries.close();
                deliveries.wait().await;
                info!("broker closed");
                Ok(())
            }
        }
    }
}
