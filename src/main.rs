//! CLI for mq
//!
//! Loads `config/default` and `MQ__*` environment variables (plus a `.env`
//! file when present), applies command-line overrides, then serves until
//! interrupted.

use std::sync::Arc;

use clap::Parser;
use mq::Broker;
use mq::client::HttpClient;
use mq::config::{ResolverKind, SelectorKind, Settings, load_config, split_servers};
use mq::utils::logging;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mq", about = "Publish/subscribe message broker")]
struct Args {
    /// MQ server address (host:port)
    #[arg(long)]
    address: Option<String>,

    /// Proxy for an MQ cluster
    #[arg(long)]
    proxy: bool,

    /// Comma separated MQ cluster list used by the proxy
    #[arg(long)]
    servers: Option<String>,

    /// Extra attempts per server after a failed one
    #[arg(long)]
    retries: Option<usize>,

    #[arg(long, value_enum)]
    selector: Option<SelectorKind>,

    #[arg(long, value_enum)]
    resolver: Option<ResolverKind>,

    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, settings: &mut Settings) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(address) = self.address {
            let (host, port) = address
                .rsplit_once(':')
                .ok_or_else(|| format!("invalid address {address}"))?;
            if !host.is_empty() {
                settings.server.host = host.to_string();
            }
            settings.server.port = port.parse()?;
        }
        if self.proxy {
            settings.proxy.enabled = true;
        }
        if let Some(servers) = self.servers {
            settings.proxy.servers = split_servers(&servers);
        }
        if let Some(retries) = self.retries {
            settings.proxy.retries = retries;
        }
        if let Some(selector) = self.selector {
            settings.proxy.selector = selector;
        }
        if let Some(resolver) = self.resolver {
            settings.proxy.resolver = resolver;
        }
        if let Some(level) = self.log_level {
            settings.log.level = level;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        logging::init("error");
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = load_config()?;
    args.apply(&mut settings)?;
    logging::init(&settings.log.level);
    settings.validate()?;

    let broker = if settings.proxy.enabled {
        let client = HttpClient::new(settings.proxy.client_options());
        Arc::new(Broker::proxy(Arc::new(client)))
    } else {
        Arc::new(Broker::with_queue_capacity(settings.broker.queue_capacity))
    };

    let listener = TcpListener::bind(settings.address()).await?;

    tokio::select! {
        res = mq::transport::serve(listener, broker.clone()) => {
            if let Err(e) = res {
                error!("server exited: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.close().await?;
    Ok(())
}
