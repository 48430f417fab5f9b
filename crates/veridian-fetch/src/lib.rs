//! Retrieval of content-addressed documents through HTTP gateways.
//!
//! # Architecture
//!
//! - `gateway` - maps a content-address origin to a concrete fetch URL
//! - `client` - minimal HTTP client seam (reqwest in production, mocks in
//!   tests)
//! - `fetcher` - the deduplicating, paced subscription fetcher
//!
//! The fetcher is mechanism only: it knows nothing about metadata or
//! contracts, just hashes and the bytes behind them.

mod error;

pub mod client;
pub mod fetcher;
pub mod gateway;

pub use client::{FetchClient, FetchResponse, ReqwestFetchClient};
pub use error::{Error, Result};
pub use fetcher::{FetcherParams, SourceFetcher, SourceTicket};
pub use gateway::{Gateway, GatewaySet, SimpleGateway};
