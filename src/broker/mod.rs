//! The `broker` module holds the standalone message broker: the topic
//! registry, the non-blocking delivery fan-out, and the `Broker` engine
//! that either uses them or proxies to a cluster client.

pub mod engine;
pub mod fanout;
pub mod topic;

pub use engine::Broker;
pub use topic::{SubscriberQueue, TopicRegistry};
