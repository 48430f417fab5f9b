//! Read-only Ethereum JSON-RPC access.
//!
//! Only the three calls the verification pipeline needs: latest block
//! number, a block with full transactions, and deployed bytecode. The
//! [`ChainClient`] trait is the seam; tests substitute scripted
//! implementations.

mod error;

pub mod client;
pub mod types;

pub use client::{ChainClient, JsonRpcClient};
pub use error::{Error, Result};
pub use types::{Block, Transaction};
