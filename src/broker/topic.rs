use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::client::SubscriptionId;

/// A registered subscriber queue: the sending half of the bounded channel
/// whose receiver is owned by exactly one subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberQueue {
    pub id: SubscriptionId,
    pub sender: mpsc::Sender<Bytes>,
}

/// Maps topic names to the queues currently registered for them.
///
/// Each topic holds an immutable, shared sequence of queues. Register and
/// deregister build a new sequence and swap it in under the write lock, so
/// a reader that cloned the `Arc` keeps a consistent snapshot and the lock
/// is never held while delivering.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, Arc<[SubscriberQueue]>>>,
}

impl TopicRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a queue under `topic`. The same subscriber may register any
    /// number of times under distinct ids.
    pub fn register(&self, topic: &str, queue: SubscriberQueue) {
        let mut topics = self.topics.write();
        let next: Arc<[SubscriberQueue]> = match topics.get(topic) {
            Some(current) => current
                .iter()
                .cloned()
                .chain(std::iter::once(queue))
                .collect(),
            None => Arc::from(vec![queue]),
        };
        topics.insert(topic.to_string(), next);
    }

    /// Removes the first queue under `topic` whose id matches. Returns false
    /// when nothing matched, which is not an error.
    pub fn deregister(&self, topic: &str, id: &SubscriptionId) -> bool {
        let mut topics = self.topics.write();
        let Some(current) = topics.get(topic) else {
            return false;
        };
        let Some(pos) = current.iter().position(|q| &q.id == id) else {
            return false;
        };

        let remaining: Vec<SubscriberQueue> = current
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pos)
            .map(|(_, q)| q.clone())
            .collect();

        if remaining.is_empty() {
            topics.remove(topic);
        } else {
            topics.insert(topic.to_string(), Arc::from(remaining));
        }
        true
    }

    /// Current subscriber sequence for `topic`, if any.
    pub fn snapshot(&self, topic: &str) -> Option<Arc<[SubscriberQueue]>> {
        self.topics.read().get(topic).cloned()
    }

    /// Number of queues registered under `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, |subs| subs.len())
    }

    /// Number of topics with at least one queue.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }
}
