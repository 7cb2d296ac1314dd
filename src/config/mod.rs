mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LogSettings, ProxySettings, ResolverKind, SelectorKind, ServerSettings,
    Settings, split_servers,
};

/// Default configuration file, looked up with any supported extension.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Loads `file` (optional) and `MQ__SECTION__KEY` environment variables,
/// then merges the result over the defaults. Call `Settings::validate`
/// once any command-line overrides have been applied.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("MQ")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let default = Settings::default();
    let server = partial.server.as_ref();
    let broker = partial.broker.as_ref();
    let proxy = partial.proxy.as_ref();
    let log = partial.log.as_ref();

    Ok(Settings {
        server: ServerSettings {
            host: server
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server.and_then(|s| s.port).unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            queue_capacity: broker
                .and_then(|b| b.queue_capacity)
                .unwrap_or(default.broker.queue_capacity),
        },
        proxy: ProxySettings {
            enabled: proxy
                .and_then(|p| p.enabled)
                .unwrap_or(default.proxy.enabled),
            servers: proxy
                .and_then(|p| p.servers.as_deref())
                .map(split_servers)
                .unwrap_or(default.proxy.servers),
            retries: proxy
                .and_then(|p| p.retries)
                .unwrap_or(default.proxy.retries),
            selector: proxy
                .and_then(|p| p.selector)
                .unwrap_or(default.proxy.selector),
            resolver: proxy
                .and_then(|p| p.resolver)
                .unwrap_or(default.proxy.resolver),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    })
}
