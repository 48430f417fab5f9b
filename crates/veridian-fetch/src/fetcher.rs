//! The deduplicating, paced source fetcher.
//!
//! Many subscribers can register interest in one content hash; one worker
//! cycles over the subscribed hashes and dispatches at most one HTTP GET
//! per `fetch_pause`, with at most one request in flight per hash. A
//! successful fetch resolves every subscriber exactly once, in
//! subscription order; failures leave the subscription in place for the
//! next cycle; a subscription untouched for `cleanup_time` is dropped and
//! its subscribers never resolve.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use veridian_core::SourceAddress;

use crate::client::FetchClient;
use crate::error::Result;
use crate::gateway::GatewaySet;

/// Resolves with the fetched bytes, or errors if the subscription was
/// cleaned up before the fetch succeeded.
pub type SourceTicket = oneshot::Receiver<Bytes>;

/// Fetcher timing parameters.
#[derive(Debug, Clone)]
pub struct FetcherParams {
    /// Hard bound on a single HTTP request.
    pub fetch_timeout: Duration,
    /// Pause between dispatches (not completions).
    pub fetch_pause: Duration,
    /// Lifetime of a subscription without a successful fetch or refresh.
    pub cleanup_time: Duration,
}

impl Default for FetcherParams {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(300),
            fetch_pause: Duration::from_secs(1),
            cleanup_time: Duration::from_secs(1800),
        }
    }
}

impl FetcherParams {
    #[must_use]
    pub fn fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    #[must_use]
    pub fn fetch_pause(mut self, fetch_pause: Duration) -> Self {
        self.fetch_pause = fetch_pause;
        self
    }

    #[must_use]
    pub fn cleanup_time(mut self, cleanup_time: Duration) -> Self {
        self.cleanup_time = cleanup_time;
        self
    }
}

struct Subscription {
    url: String,
    in_flight: bool,
    subscribers: Vec<oneshot::Sender<Bytes>>,
    /// Last subscribe() for this hash; re-subscribing resets the cleanup clock.
    refreshed_at: Instant,
}

struct Shared {
    params: FetcherParams,
    gateways: GatewaySet,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

pub struct SourceFetcher {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl SourceFetcher {
    /// Create the fetcher and start its worker loop.
    pub fn new<C: FetchClient>(params: FetcherParams, gateways: GatewaySet, client: C) -> Self {
        let shared = Arc::new(Shared {
            params,
            gateways,
            subscriptions: Mutex::new(HashMap::new()),
        });
        let worker = tokio::spawn(run_worker(Arc::clone(&shared), Arc::new(client)));
        Self { shared, worker }
    }

    /// Register interest in a content hash.
    ///
    /// The returned ticket resolves with the body once the hash is fetched;
    /// subscriptions for the same hash share one in-flight request. Fails
    /// only when no gateway is registered for the address origin.
    pub async fn subscribe(&self, address: &SourceAddress) -> Result<SourceTicket> {
        let url = self.shared.gateways.resolve(address)?;
        let (tx, rx) = oneshot::channel();

        let mut subscriptions = self.shared.subscriptions.lock().await;
        let subscription = subscriptions
            .entry(address.unique_id())
            .or_insert_with(|| Subscription {
                url,
                in_flight: false,
                subscribers: Vec::new(),
                refreshed_at: Instant::now(),
            });
        subscription.refreshed_at = Instant::now();
        subscription.subscribers.push(tx);
        Ok(rx)
    }

    /// Number of live subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.shared.subscriptions.lock().await.len()
    }
}

impl Drop for SourceFetcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

enum Step {
    Skip,
    Dispatch(String),
}

async fn run_worker<C: FetchClient>(shared: Arc<Shared>, client: Arc<C>) {
    let pause = shared.params.fetch_pause;
    loop {
        let keys: Vec<String> = {
            let subscriptions = shared.subscriptions.lock().await;
            subscriptions.keys().cloned().collect()
        };
        if keys.is_empty() {
            tokio::time::sleep(pause).await;
            continue;
        }

        for key in keys {
            let step = next_step(&shared, &key).await;
            if let Step::Dispatch(url) = step {
                tokio::spawn(fetch_one(
                    Arc::clone(&shared),
                    Arc::clone(&client),
                    key,
                    url,
                ));
                tokio::time::sleep(pause).await;
            }
        }
    }
}

/// Decide what to do with one hash on this visit. Skips are fast steps;
/// only a dispatch consumes the inter-dispatch pause.
async fn next_step(shared: &Shared, key: &str) -> Step {
    let mut subscriptions = shared.subscriptions.lock().await;
    match subscriptions.get_mut(key) {
        None => return Step::Skip,
        Some(subscription) if subscription.in_flight => return Step::Skip,
        Some(subscription) if subscription.refreshed_at.elapsed() < shared.params.cleanup_time => {
            subscription.in_flight = true;
            return Step::Dispatch(subscription.url.clone());
        }
        Some(_) => {}
    }

    // Removed before the senders drop, so expired subscribers observe a
    // closed channel and never a value.
    if let Some(subscription) = subscriptions.remove(key) {
        debug!(
            source = key,
            subscribers = subscription.subscribers.len(),
            "subscription expired before completion"
        );
    }
    Step::Skip
}

async fn fetch_one<C: FetchClient>(shared: Arc<Shared>, client: Arc<C>, key: String, url: String) {
    match tokio::time::timeout(shared.params.fetch_timeout, client.get(&url)).await {
        Ok(Ok(response)) if response.is_success() => {
            // Take the subscriber list and remove the subscription first,
            // then notify; late subscribers race onto a fresh entry.
            let subscribers = {
                let mut subscriptions = shared.subscriptions.lock().await;
                match subscriptions.remove(&key) {
                    Some(subscription) => subscription.subscribers,
                    None => return,
                }
            };
            debug!(
                source = %key,
                bytes = response.body.len(),
                subscribers = subscribers.len(),
                "source fetched"
            );
            for subscriber in subscribers {
                let _ = subscriber.send(response.body.clone());
            }
        }
        Ok(Ok(response)) => {
            let snippet = response.body.len().min(200);
            warn!(
                source = %key,
                status = response.status,
                body = %String::from_utf8_lossy(&response.body[..snippet]),
                "gateway returned failure, will retry"
            );
            clear_in_flight(&shared, &key).await;
        }
        Ok(Err(e)) => {
            warn!(source = %key, error = %e, "fetch failed, will retry");
            clear_in_flight(&shared, &key).await;
        }
        Err(_) => {
            warn!(source = %key, "fetch timed out, will retry");
            clear_in_flight(&shared, &key).await;
        }
    }
}

async fn clear_in_flight(shared: &Shared, key: &str) {
    let mut subscriptions = shared.subscriptions.lock().await;
    if let Some(subscription) = subscriptions.get_mut(key) {
        subscription.in_flight = false;
    }
}
