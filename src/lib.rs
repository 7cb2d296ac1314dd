//! # mq
//!
//! `mq` is a lightweight in-memory publish/subscribe broker reachable over
//! HTTP and WebSocket, plus a client that can also act as a fan-out proxy
//! in front of a cluster of independent brokers.
//!
//! ## Core Modules
//!
//! - `broker`: topic registry, non-blocking delivery fan-out, and the `Broker` engine.
//! - `client`: the cluster client with server selection, retries, and discovery.
//! - `config`: loading and validating server configuration.
//! - `transport`: the `/pub` and `/sub` HTTP/WebSocket endpoints.
//! - `utils`: shared error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use broker::Broker;
pub use client::{Client, HttpClient, Options, Subscription};
pub use utils::{MqError, Result};

#[cfg(test)]
mod tests;
