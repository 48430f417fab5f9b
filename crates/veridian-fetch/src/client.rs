//! Minimal HTTP client seam for the fetcher.

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

/// One completed HTTP GET: status code and full body.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Asynchronous GET abstraction.
///
/// The production implementation is [`ReqwestFetchClient`]; tests supply
/// mocks. Timeouts are enforced by the fetcher around the whole call, so
/// implementations do not need their own.
pub trait FetchClient: Send + Sync + 'static {
    fn get(&self, url: &str) -> impl Future<Output = Result<FetchResponse>> + Send;
}

pub struct ReqwestFetchClient {
    client: reqwest::Client,
}

impl ReqwestFetchClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }
}

impl FetchClient for ReqwestFetchClient {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(FetchResponse { status, body })
    }
}
