//! HTTP cluster client
//!
//! Publishes with `POST {addr}/pub?topic=` and subscribes with a WebSocket
//! upgrade on `GET {addr}/sub?topic=`, against every address the selector
//! returns for the topic.
//!
//! Broadcast policy: every selected address is attempted, each up to
//! `1 + retries` times with no delay between attempts, stopping at its first
//! success. A failing address never stops the loop. The call reports the
//! outcome of the last address attempted, so a failure on an earlier
//! address is only logged when a later one succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::join_all;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::{RwLock, mpsc};
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::connection::SubscriberConnection;
use super::options::{Options, normalize_address};
use super::resolver::Resolver;
use super::selector::Selector;
use super::{Client, Subscription, SubscriptionId};
use crate::utils::{MqError, Result};

/// Output queue slots reserved per configured server.
pub const QUEUE_SLOTS_PER_SERVER: usize = 256;

/// [`Client`] that talks to a cluster of brokers over HTTP and WebSocket.
pub struct HttpClient {
    options: Options,
    http: reqwest::Client,
    exit: CancellationToken,
    tasks: TaskTracker,
    subscribers: RwLock<HashMap<SubscriptionId, Vec<SubscriberConnection>>>,
}

impl HttpClient {
    /// Builds the client and hands the normalized server list to the
    /// selector. With a resolver configured, the discovery loop is spawned
    /// here, so this must then run inside a Tokio runtime.
    pub fn new(mut options: Options) -> Self {
        options.servers = options
            .servers
            .iter()
            .map(|s| normalize_address(s))
            .collect();
        options.selector.set(options.servers.clone());

        let client = Self {
            options,
            http: reqwest::Client::new(),
            exit: CancellationToken::new(),
            tasks: TaskTracker::new(),
            subscribers: RwLock::new(HashMap::new()),
        };

        if let Some(resolver) = client.options.resolver.clone() {
            client.tasks.spawn(run_discovery(
                resolver,
                client.options.selector.clone(),
                client.options.servers.clone(),
                client.options.discovery_interval,
                client.exit.clone(),
            ));
        }

        client
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.exit.is_cancelled()
    }

    /// Runs one discovery cycle now. Returns how many addresses were
    /// resolved; zero leaves the selector untouched.
    pub async fn discover(&self) -> usize {
        match &self.options.resolver {
            Some(resolver) => {
                refresh(
                    resolver.as_ref(),
                    self.options.selector.as_ref(),
                    &self.options.servers,
                )
                .await
            }
            None => 0,
        }
    }

    /// Number of live backend connections across all subscriptions.
    pub async fn connection_count(&self) -> usize {
        self.subscribers.read().await.values().map(Vec::len).sum()
    }

    async fn publish_once(&self, addr: &str, topic: &str, payload: Bytes) -> Result<()> {
        let mut url = reqwest::Url::parse(&format!("{}/pub", addr.trim_end_matches('/')))
            .map_err(|_| MqError::InvalidAddress(addr.to_string()))?;
        url.query_pairs_mut().append_pair("topic", topic);

        let rsp = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(|source| MqError::Http {
                addr: addr.to_string(),
                source,
            })?;

        if !rsp.status().is_success() {
            return Err(MqError::Status {
                addr: addr.to_string(),
                status: rsp.status().as_u16(),
            });
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.exit.is_cancelled() {
            return Err(MqError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.ensure_open()?;
        let servers = self.options.selector.get(topic)?;

        let mut outcome = Ok(());
        for addr in &servers {
            for attempt in 0..=self.options.retries {
                match self.publish_once(addr, topic, payload.clone()).await {
                    Ok(()) => {
                        outcome = Ok(());
                        break;
                    }
                    Err(e) => {
                        warn!(addr = %addr, topic, attempt, error = %e, "publish attempt failed");
                        outcome = Err(e);
                    }
                }
            }
        }
        outcome
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        // Close waits on the tracker, so it also waits for this call.
        let _in_flight = self.tasks.token();
        self.ensure_open()?;
        let servers = self.options.selector.get(topic)?;

        let capacity = self.options.servers.len().max(1) * QUEUE_SLOTS_PER_SERVER;
        let (tx, rx) = mpsc::channel(capacity);

        let mut connections = Vec::with_capacity(servers.len());
        let mut last_error = None;
        'servers: for addr in &servers {
            for attempt in 0..=self.options.retries {
                let dialed = tokio::select! {
                    _ = self.exit.cancelled() => break 'servers,
                    dialed = SubscriberConnection::dial(addr, topic, tx.clone()) => dialed,
                };
                match dialed {
                    Ok(conn) => {
                        connections.push(conn);
                        last_error = None;
                        break;
                    }
                    Err(e) => {
                        warn!(addr = %addr, topic, attempt, error = %e, "subscribe attempt failed");
                        last_error = Some(e);
                    }
                }
            }
        }
        // Readers hold the remaining senders; the queue ends once they all exit.
        drop(tx);

        if self.exit.is_cancelled() {
            join_all(connections.iter().map(SubscriberConnection::close)).await;
            return Err(MqError::Closed);
        }

        let subscription = Subscription::new(topic, rx).with_partial_error(last_error);
        if connections.is_empty() {
            return Ok(subscription);
        }

        let mut subscribers = self.subscribers.write().await;
        if self.exit.is_cancelled() {
            drop(subscribers);
            join_all(connections.iter().map(SubscriberConnection::close)).await;
            return Err(MqError::Closed);
        }
        debug!(
            subscription = %subscription.id(),
            topic,
            connections = connections.len(),
            "subscription opened"
        );
        subscribers.insert(subscription.id(), connections);
        Ok(subscription)
    }

    async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        self.ensure_open()?;

        let mut subscribers = self.subscribers.write().await;
        if let Some(connections) = subscribers.remove(&subscription.id()) {
            join_all(connections.iter().map(SubscriberConnection::close)).await;
            debug!(subscription = %subscription.id(), "subscription closed");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.exit.is_cancelled() {
            info!("closing client");
        }
        self.exit.cancel();
        self.tasks.close();

        // A concurrent second caller waits here until the first has
        // finished tearing connections down, then finds nothing left.
        let mut subscribers = self.subscribers.write().await;
        let connections: Vec<SubscriberConnection> =
            subscribers.drain().flat_map(|(_, conns)| conns).collect();
        join_all(connections.iter().map(SubscriberConnection::close)).await;
        drop(subscribers);

        // Discovery and any subscribe still dialing.
        self.tasks.wait().await;
        Ok(())
    }
}

/// Resolves every configured name and, when at least one address came
/// back, replaces the selector's set with all of them.
async fn refresh(resolver: &dyn Resolver, selector: &dyn Selector, names: &[String]) -> usize {
    let mut servers = Vec::new();
    for name in names {
        match resolver.resolve(name).await {
            Ok(addrs) => servers.extend(addrs.iter().map(|a| normalize_address(a))),
            Err(e) => warn!(name = %name, error = %e, "failed to resolve server"),
        }
    }

    let resolved = servers.len();
    if resolved > 0 {
        selector.set(servers);
    }
    resolved
}

async fn run_discovery(
    resolver: Arc<dyn Resolver>,
    selector: Arc<dyn Selector>,
    names: Vec<String>,
    period: Duration,
    exit: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = exit.cancelled() => return,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = exit.cancelled() => return,
            resolved = refresh(resolver.as_ref(), selector.as_ref(), &names) => {
                debug!(resolved, "discovery cycle finished");
            }
        }
    }
}
