//! The per-chain block loop.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use veridian_chain::ChainClient;
use veridian_core::SourceAddress;
use veridian_verify::{InjectInput, Injector};

use crate::assembler::{AssembleError, ContractAssembler};

#[derive(Debug, Clone)]
pub struct ChainMonitorParams {
    /// First block to scan; chain head when unset.
    pub start_block: Option<u64>,
    /// Pause between block loop iterations.
    pub get_block_pause: Duration,
    /// Pause between `eth_getCode` attempts for a fresh creation.
    pub get_code_retry_pause: Duration,
    /// `eth_getCode` attempts before an address is dropped.
    pub initial_get_bytecode_tries: u32,
}

impl Default for ChainMonitorParams {
    fn default() -> Self {
        Self {
            start_block: None,
            get_block_pause: Duration::from_secs(2),
            get_code_retry_pause: Duration::from_secs(2),
            initial_get_bytecode_tries: 3,
        }
    }
}

impl ChainMonitorParams {
    #[must_use]
    pub fn start_block(mut self, start_block: Option<u64>) -> Self {
        self.start_block = start_block;
        self
    }

    #[must_use]
    pub fn get_block_pause(mut self, get_block_pause: Duration) -> Self {
        self.get_block_pause = get_block_pause;
        self
    }

    #[must_use]
    pub fn get_code_retry_pause(mut self, get_code_retry_pause: Duration) -> Self {
        self.get_code_retry_pause = get_code_retry_pause;
        self
    }

    #[must_use]
    pub fn initial_get_bytecode_tries(mut self, tries: u32) -> Self {
        self.initial_get_bytecode_tries = tries;
        self
    }
}

/// Walks one chain block by block, feeding every contract creation through
/// assembly and verification.
pub struct ChainMonitor {
    chain_id: u64,
    client: Arc<dyn ChainClient>,
    assembler: Arc<ContractAssembler>,
    injector: Arc<Injector>,
    params: ChainMonitorParams,
}

impl ChainMonitor {
    pub fn new(
        chain_id: u64,
        client: Arc<dyn ChainClient>,
        assembler: Arc<ContractAssembler>,
        injector: Arc<Injector>,
        params: ChainMonitorParams,
    ) -> Self {
        Self {
            chain_id,
            client,
            assembler,
            injector,
            params,
        }
    }

    /// The block loop. Never returns; all errors are logged and the loop
    /// continues.
    pub async fn run(self: Arc<Self>) {
        let mut number = self.starting_block().await;
        info!(
            chain = self.chain_id,
            block = number,
            "watching for contract creations"
        );

        loop {
            match self.client.block_with_transactions(number).await {
                Ok(Some(block)) => {
                    for tx in &block.transactions {
                        if !tx.is_contract_creation() {
                            continue;
                        }
                        let address = tx.created_contract_address();
                        debug!(
                            chain = self.chain_id,
                            block = number,
                            %address,
                            tx = %tx.hash,
                            "contract creation"
                        );
                        let monitor = Arc::clone(&self);
                        tokio::spawn(async move {
                            monitor
                                .process_bytecode(address, monitor.params.initial_get_bytecode_tries)
                                .await;
                        });
                    }
                    number += 1;
                }
                // The head catches up naturally: the same block is polled
                // until the node has it.
                Ok(None) => {
                    debug!(chain = self.chain_id, block = number, "block not yet available");
                }
                // Transient RPC failure also retries the same block; the
                // loop must never stall or skip on an error.
                Err(e) => {
                    warn!(chain = self.chain_id, block = number, error = %e, "block fetch failed");
                }
            }
            sleep(self.params.get_block_pause).await;
        }
    }

    async fn starting_block(&self) -> u64 {
        if let Some(number) = self.params.start_block {
            return number;
        }
        loop {
            match self.client.latest_block_number().await {
                Ok(number) => return number,
                Err(e) => {
                    warn!(chain = self.chain_id, error = %e, "cannot read chain head, retrying");
                    sleep(self.params.get_block_pause).await;
                }
            }
        }
    }

    /// Read the created contract's bytecode, tolerating nodes whose state
    /// lags the head by a block or two. Exhausting the tries drops the
    /// address silently; a creation that reverted never produces code.
    async fn process_bytecode(&self, address: Address, tries: u32) {
        for attempt in 1..=tries {
            match self.client.get_code(address).await {
                Ok(code) if !code.is_empty() => {
                    self.verify_creation(address, code).await;
                    return;
                }
                Ok(_) => {
                    debug!(chain = self.chain_id, %address, attempt, "no bytecode yet");
                }
                Err(e) => {
                    warn!(chain = self.chain_id, %address, attempt, error = %e, "eth_getCode failed");
                }
            }
            if attempt < tries {
                sleep(self.params.get_code_retry_pause).await;
            }
        }
        debug!(chain = self.chain_id, %address, tries, "bytecode never appeared, dropping");
    }

    async fn verify_creation(&self, address: Address, code: Bytes) {
        let source = match SourceAddress::from_bytecode(&code) {
            Ok(source) => source,
            Err(e) => {
                debug!(chain = self.chain_id, %address, error = %e, "no metadata pointer in bytecode");
                return;
            }
        };
        info!(chain = self.chain_id, %address, source = %source, "assembling sources");

        let contract = match self.assembler.assemble(source).await {
            Ok(contract) => contract,
            Err(AssembleError::Expired) => {
                debug!(chain = self.chain_id, %address, "assembly expired, awaiting rediscovery");
                return;
            }
            Err(e) => {
                warn!(chain = self.chain_id, %address, error = %e, "assembly failed");
                return;
            }
        };

        let input = InjectInput::Assembled {
            contract,
            bytecode: code,
            chain: self.chain_id,
            address,
        };
        match self.injector.inject(input).await {
            Ok(outcomes) => {
                for outcome in outcomes {
                    info!(
                        chain = self.chain_id,
                        %address,
                        result = %outcome.match_kind,
                        path = %outcome.stored_path.display(),
                        "archived"
                    );
                }
            }
            Err(e) => {
                warn!(chain = self.chain_id, %address, error = %e, "verification failed");
            }
        }
    }
}
