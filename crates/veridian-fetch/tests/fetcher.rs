//! Behavioral tests for the source fetcher, against a scripted client and
//! a paused clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::Instant;

use veridian_core::{SourceAddress, SourceOrigin};
use veridian_fetch::{
    FetchClient, FetchResponse, FetcherParams, GatewaySet, SourceFetcher,
};

/// What the scripted client does for one GET.
#[derive(Clone)]
enum Script {
    Respond(u16, &'static str),
    Hang,
}

#[derive(Clone, Default)]
struct ScriptedClient {
    scripts: Arc<Mutex<HashMap<String, Vec<Script>>>>,
    requests: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl ScriptedClient {
    async fn script(&self, url: &str, steps: Vec<Script>) {
        self.scripts.lock().await.insert(url.to_string(), steps);
    }

    async fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|(u, _)| u == url)
            .count()
    }

    async fn request_instants(&self) -> Vec<Instant> {
        self.requests.lock().await.iter().map(|(_, t)| *t).collect()
    }
}

impl FetchClient for ScriptedClient {
    async fn get(&self, url: &str) -> veridian_fetch::Result<FetchResponse> {
        self.requests
            .lock()
            .await
            .push((url.to_string(), Instant::now()));

        let step = {
            let mut scripts = self.scripts.lock().await;
            let steps = scripts.entry(url.to_string()).or_default();
            if steps.is_empty() {
                Script::Respond(404, "not found")
            } else {
                steps.remove(0)
            }
        };

        match step {
            Script::Respond(status, body) => Ok(FetchResponse {
                status,
                body: Bytes::from_static(body.as_bytes()),
            }),
            Script::Hang => std::future::pending().await,
        }
    }
}

fn gateways() -> GatewaySet {
    GatewaySet::with_defaults("ipfs://", "swarm://")
}

fn params() -> FetcherParams {
    FetcherParams::default()
        .fetch_timeout(Duration::from_millis(500))
        .fetch_pause(Duration::from_millis(10))
        .cleanup_time(Duration::from_millis(200))
}

fn addr(id: &str) -> SourceAddress {
    SourceAddress::new(SourceOrigin::Ipfs, id)
}

#[tokio::test(start_paused = true)]
async fn test_shared_fetch_resolves_every_subscriber() {
    let client = ScriptedClient::default();
    client
        .script("ipfs://QmA", vec![Script::Respond(200, "contract A")])
        .await;
    let fetcher = SourceFetcher::new(params(), gateways(), client.clone());

    let first = fetcher.subscribe(&addr("QmA")).await.unwrap();
    let second = fetcher.subscribe(&addr("QmA")).await.unwrap();

    assert_eq!(first.await.unwrap(), Bytes::from_static(b"contract A"));
    assert_eq!(second.await.unwrap(), Bytes::from_static(b"contract A"));

    // Two subscribers, one request.
    assert_eq!(client.request_count("ipfs://QmA").await, 1);
    assert_eq!(fetcher.subscription_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failure_is_retried_next_cycle() {
    let client = ScriptedClient::default();
    client
        .script(
            "ipfs://QmB",
            vec![
                Script::Respond(500, "upstream error"),
                Script::Respond(200, "body"),
            ],
        )
        .await;
    let fetcher = SourceFetcher::new(params(), gateways(), client.clone());

    let ticket = fetcher.subscribe(&addr("QmB")).await.unwrap();
    assert_eq!(ticket.await.unwrap(), Bytes::from_static(b"body"));
    assert_eq!(client.request_count("ipfs://QmB").await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_retried() {
    let client = ScriptedClient::default();
    client
        .script(
            "ipfs://QmC",
            vec![Script::Hang, Script::Respond(200, "late but fine")],
        )
        .await;
    let fetcher = SourceFetcher::new(params(), gateways(), client.clone());

    let ticket = fetcher.subscribe(&addr("QmC")).await.unwrap();
    assert_eq!(ticket.await.unwrap(), Bytes::from_static(b"late but fine"));
    assert_eq!(client.request_count("ipfs://QmC").await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_subscription_never_resolves() {
    // Scripted client answers 404 forever, so the subscription can only
    // age out.
    let client = ScriptedClient::default();
    let fetcher = SourceFetcher::new(params(), gateways(), client.clone());

    let ticket = fetcher.subscribe(&addr("QmGone")).await.unwrap();
    assert!(ticket.await.is_err());
    assert_eq!(fetcher.subscription_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_resets_cleanup_clock() {
    let client = ScriptedClient::default();
    let fetcher = SourceFetcher::new(params(), gateways(), client.clone());

    let first = fetcher.subscribe(&addr("QmD")).await.unwrap();
    // Just before expiry, renew interest; the subscription must survive a
    // second near-cleanup interval.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let second = fetcher.subscribe(&addr("QmD")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    client
        .script("ipfs://QmD", vec![Script::Respond(200, "renewed")])
        .await;

    assert_eq!(first.await.unwrap(), Bytes::from_static(b"renewed"));
    assert_eq!(second.await.unwrap(), Bytes::from_static(b"renewed"));
}

#[tokio::test(start_paused = true)]
async fn test_dispatches_are_paced() {
    let client = ScriptedClient::default();
    let fetcher = SourceFetcher::new(params(), gateways(), client.clone());

    // Three hashes competing for the single worker.
    let _a = fetcher.subscribe(&addr("Qm1")).await.unwrap();
    let _b = fetcher.subscribe(&addr("Qm2")).await.unwrap();
    let _c = fetcher.subscribe(&addr("Qm3")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let instants = client.request_instants().await;
    assert!(instants.len() >= 3);
    for pair in instants.windows(2) {
        assert!(
            pair[1].duration_since(pair[0]) >= Duration::from_millis(10),
            "dispatches closer than fetch_pause"
        );
    }
}
