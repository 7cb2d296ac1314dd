use async_trait::async_trait;

use crate::utils::{MqError, Result};

/// Port assumed when a name carries none.
pub const DEFAULT_PORT: u16 = 8081;

/// Maps a logical server name to concrete network addresses.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Vec<String>>;
}

/// Resolves `host[:port]` through the system resolver and returns one
/// `ip:port` per record.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    default_port: u16,
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
        }
    }
}

impl DnsResolver {
    pub fn with_default_port(default_port: u16) -> Self {
        Self { default_port }
    }

    fn host_port<'a>(&self, name: &'a str) -> (&'a str, u16) {
        let name = name
            .strip_prefix("http://")
            .or_else(|| name.strip_prefix("https://"))
            .unwrap_or(name)
            .trim_end_matches('/');

        if let Some((host, port)) = name.rsplit_once(':') {
            let bare_ipv6 = host.contains(':') && !host.starts_with('[');
            if let (false, Ok(port)) = (bare_ipv6, port.parse::<u16>()) {
                return (host, port);
            }
        }
        (name, self.default_port)
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, name: &str) -> Result<Vec<String>> {
        let (host, port) = self.host_port(name);
        let addrs = tokio::net::lookup_host((host.trim_matches(|c| c == '[' || c == ']'), port))
            .await
            .map_err(|source| MqError::Resolve {
                name: name.to_string(),
                source,
            })?;
        Ok(addrs.map(|addr| addr.to_string()).collect())
    }
}
