use std::sync::Arc;

use config::ConfigError;
use serde::Deserialize;

use crate::client::{DnsResolver, Options, SelectAll, Shard};

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub proxy: ProxySettings,
    pub log: LogSettings,
}

/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub queue_capacity: usize,
}

/// Cluster proxy settings. When `enabled`, every publish and subscribe is
/// forwarded to `servers` instead of being served locally.
#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub enabled: bool,
    pub servers: Vec<String>,
    pub retries: usize,
    pub selector: SelectorKind,
    pub resolver: ResolverKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    /// Every server receives every topic.
    All,
    /// Each topic is pinned to one server by hash.
    Shard,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    None,
    Dns,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub proxy: Option<PartialProxySettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub queue_capacity: Option<usize>,
}

/// `servers` is a comma separated list, as given on the command line.
#[derive(Debug, Deserialize)]
pub struct PartialProxySettings {
    pub enabled: Option<bool>,
    pub servers: Option<String>,
    pub retries: Option<usize>,
    pub selector: Option<SelectorKind>,
    pub resolver: Option<ResolverKind>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8081,
            },
            broker: BrokerSettings {
                queue_capacity: crate::broker::engine::DEFAULT_QUEUE_CAPACITY,
            },
            proxy: ProxySettings {
                enabled: false,
                servers: Vec::new(),
                retries: crate::client::options::DEFAULT_RETRIES,
                selector: SelectorKind::All,
                resolver: ResolverKind::None,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Rejects combinations the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.enabled && self.proxy.servers.is_empty() {
            return Err(ConfigError::Message(
                "proxy enabled without MQ server list".to_string(),
            ));
        }
        if self.broker.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "broker.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl ProxySettings {
    /// Client options for the configured cluster.
    pub fn client_options(&self) -> Options {
        let options = Options::default()
            .with_servers(self.servers.iter().cloned())
            .with_retries(self.retries);

        let options = match self.selector {
            SelectorKind::All => options.with_selector(Arc::new(SelectAll::default())),
            SelectorKind::Shard => options.with_selector(Arc::new(Shard::default())),
        };

        match self.resolver {
            ResolverKind::None => options,
            ResolverKind::Dns => options.with_resolver(Arc::new(DnsResolver::default())),
        }
    }
}

/// Splits a comma separated server list, dropping blanks.
pub fn split_servers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
