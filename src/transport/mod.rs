//! The `transport` module is responsible for network communication with
//! publishers and subscribers: a plain HTTP POST for publishing and a
//! WebSocket stream for subscribing, both forwarded to the broker.

pub mod http;

pub use http::{router, serve};

#[cfg(test)]
mod tests;
