//! Wire types for the slice of the RPC surface this crate reads.

use alloy_primitives::{Address, B256, U64};
use serde::Deserialize;

/// A block with full transaction objects, as returned by
/// `eth_getBlockByNumber(_, true)`. Only the fields the monitor consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    number: U64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.number.to::<u64>()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub hash: B256,
    pub from: Address,
    /// Absent for contract-creation transactions.
    #[serde(default)]
    pub to: Option<Address>,
    nonce: U64,
}

impl Transaction {
    pub fn nonce(&self) -> u64 {
        self.nonce.to::<u64>()
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Deterministic address of the contract this transaction created.
    pub fn created_contract_address(&self) -> Address {
        self.from.create(self.nonce())
    }
}
