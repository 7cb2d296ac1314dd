//! The `error` module defines the error type shared by the broker, the
//! cluster client and the transport adapters.
//!
//! Closed and no-server conditions are surfaced immediately. The transport
//! variants describe one failed network attempt against one backend address;
//! the client retries those and reports only the last one it saw.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("client closed")]
    Closed,

    #[error("no servers available")]
    NoServers,

    #[error("publish to {addr} failed: {source}")]
    Http {
        addr: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("non 200 response {status} from {addr}")]
    Status { addr: String, status: u16 },

    #[error("subscribe to {addr} failed: {source}")]
    WebSocket {
        addr: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    #[error("invalid server address {0}")]
    InvalidAddress(String),

    #[error("failed to resolve {name}: {source}")]
    Resolve {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl MqError {
    /// True for errors produced by a single network attempt against one
    /// address. These are retried and never abort a broadcast.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MqError::Http { .. } | MqError::Status { .. } | MqError::WebSocket { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MqError>;
