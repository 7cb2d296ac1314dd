use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::resolver::Resolver;
use super::selector::{SelectAll, Selector};

/// Server used when none is configured.
pub const DEFAULT_SERVERS: &[&str] = &["http://127.0.0.1:8081"];

/// Extra attempts per address after the first one fails.
pub const DEFAULT_RETRIES: usize = 1;

/// How often the resolver is consulted for a fresh server list.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(30);

/// Construction options for [`HttpClient`](super::HttpClient).
#[derive(Clone)]
pub struct Options {
    pub servers: Vec<String>,
    pub retries: usize,
    pub selector: Arc<dyn Selector>,
    pub resolver: Option<Arc<dyn Resolver>>,
    pub discovery_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            servers: DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect(),
            retries: DEFAULT_RETRIES,
            selector: Arc::new(SelectAll::default()),
            resolver: None,
            discovery_interval: DISCOVERY_INTERVAL,
        }
    }
}

impl Options {
    /// Replaces the server list. Blank entries are skipped.
    pub fn with_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = servers
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.trim().is_empty())
            .collect();
        self
    }

    /// Extra attempts per address after the first failure.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Uses `selector` instead of [`SelectAll`].
    pub fn with_selector(mut self, selector: Arc<dyn Selector>) -> Self {
        self.selector = selector;
        self
    }

    /// Enables periodic discovery through `resolver`.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// How often the discovery loop runs.
    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("servers", &self.servers)
            .field("retries", &self.retries)
            .field("resolver", &self.resolver.is_some())
            .field("discovery_interval", &self.discovery_interval)
            .finish()
    }
}

/// Prefixes `http://` onto addresses that carry no scheme.
pub fn normalize_address(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with("http") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}
