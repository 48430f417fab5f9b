//! The chain client seam and its JSON-RPC implementation.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, Bytes, U64};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::types::Block;

/// Read-only chain access used by the monitor and the injector.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64>;

    /// `Ok(None)` when the block does not exist yet.
    async fn block_with_transactions(&self, number: u64) -> Result<Option<Block>>;

    /// Deployed runtime bytecode at `address`; empty for plain accounts
    /// and for contracts whose creation has not been indexed yet.
    async fn get_code(&self, address: Address) -> Result<Bytes>;
}

/// `ChainClient` over HTTP JSON-RPC.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    /// Stays `Null` for absent results; `eth_getBlockByNumber` uses a null
    /// result for a block that does not exist yet.
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(response.result)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn latest_block_number(&self) -> Result<u64> {
        let number: U64 = self.call("eth_blockNumber", json!([])).await?;
        Ok(number.to::<u64>())
    }

    async fn block_with_transactions(&self, number: u64) -> Result<Option<Block>> {
        self.call(
            "eth_getBlockByNumber",
            json!([format!("{number:#x}"), true]),
        )
        .await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        self.call("eth_getCode", json!([format!("{address:#x}"), "latest"]))
            .await
    }
}
