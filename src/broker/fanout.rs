//! Delivery fan-out
//!
//! Pushes one payload into every queue of a subscriber snapshot without
//! waiting on any of them. A full queue loses the payload for that
//! subscriber only; a closed queue belongs to a subscriber that is going
//! away and is skipped.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::task::TaskTracker;
use tracing::trace;

use super::topic::SubscriberQueue;

/// Delivers `payload` to every queue in `subscribers`. Returns the number
/// of queues that accepted it.
pub fn deliver(topic: &str, subscribers: &[SubscriberQueue], payload: &Bytes) -> usize {
    let mut delivered = 0;
    for sub in subscribers {
        match sub.sender.try_send(payload.clone()) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                trace!(topic, subscription = %sub.id, "subscriber queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                trace!(topic, subscription = %sub.id, "subscriber queue closed");
            }
        }
    }
    delivered
}

/// Runs [`deliver`] as a background task tracked by `tasks`, so the
/// publisher returns before delivery completes.
pub fn spawn_delivery(
    tasks: &TaskTracker,
    topic: String,
    subscribers: Arc<[SubscriberQueue]>,
    payload: Bytes,
) {
    tasks.spawn(async move {
        deliver(&topic, &subscribers, &payload);
    });
}
