//! Server selection
//!
//! A selector owns the set of known backend addresses and decides which of
//! them serve a topic. The set is replaced wholesale by discovery while
//! publish and subscribe calls read it, so each implementation swaps an
//! immutable list behind a lock and readers only ever see a complete list.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::utils::{MqError, Result};

/// Picks the servers a topic is sent to. `set` may be called while
/// other tasks are reading; each `get` sees one whole set.
pub trait Selector: Send + Sync {
    /// Addresses eligible to serve `topic`, in the order they should be tried.
    fn get(&self, topic: &str) -> Result<Vec<String>>;

    /// Replaces the known address set.
    fn set(&self, servers: Vec<String>);
}

/// Returns every known server for every topic.
#[derive(Debug, Default)]
pub struct SelectAll {
    servers: RwLock<Arc<[String]>>,
}

impl SelectAll {
    /// Starts with `servers` as the known set.
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers: RwLock::new(Arc::from(servers)),
        }
    }
}

impl Selector for SelectAll {
    fn get(&self, _topic: &str) -> Result<Vec<String>> {
        let servers = self.servers.read().clone();
        if servers.is_empty() {
            return Err(MqError::NoServers);
        }
        Ok(servers.to_vec())
    }

    fn set(&self, servers: Vec<String>) {
        *self.servers.write() = Arc::from(servers);
    }
}

/// Pins each topic to a single server chosen by the CRC32 of the topic name,
/// so every client with the same server list agrees on the owner.
#[derive(Debug, Default)]
pub struct Shard {
    servers: RwLock<Arc<[String]>>,
}

impl Shard {
    /// Starts with `servers` as the known set.
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers: RwLock::new(Arc::from(servers)),
        }
    }
}

impl Selector for Shard {
    fn get(&self, topic: &str) -> Result<Vec<String>> {
        let servers = self.servers.read().clone();
        if servers.is_empty() {
            return Err(MqError::NoServers);
        }
        let idx = crc32fast::hash(topic.as_bytes()) as usize % servers.len();
        Ok(vec![servers[idx].clone()])
    }

    fn set(&self, servers: Vec<String>) {
        *self.servers.write() = Arc::from(servers);
    }
}
