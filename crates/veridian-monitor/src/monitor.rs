//! Lifecycle owner of the monitoring pipeline.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use veridian_chain::ChainClient;
use veridian_fetch::SourceFetcher;
use veridian_verify::Injector;

use crate::assembler::ContractAssembler;
use crate::chain_monitor::{ChainMonitor, ChainMonitorParams};

/// One watched chain: its id, RPC client and loop parameters.
pub struct ChainSpec {
    pub chain_id: u64,
    pub client: Arc<dyn ChainClient>,
    pub params: ChainMonitorParams,
}

/// Owns the shared fetcher, assembler and injector plus one
/// [`ChainMonitor`] per configured chain, for the whole process lifetime.
pub struct Monitor {
    monitors: Vec<Arc<ChainMonitor>>,
    handles: Vec<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(fetcher: SourceFetcher, injector: Injector, chains: Vec<ChainSpec>) -> Self {
        let assembler = Arc::new(ContractAssembler::new(Arc::new(fetcher)));
        let injector = Arc::new(injector);

        let monitors = chains
            .into_iter()
            .map(|spec| {
                Arc::new(ChainMonitor::new(
                    spec.chain_id,
                    spec.client,
                    Arc::clone(&assembler),
                    Arc::clone(&injector),
                    spec.params,
                ))
            })
            .collect();

        Self {
            monitors,
            handles: Vec::new(),
        }
    }

    /// Start every chain monitor.
    pub fn start(&mut self) {
        for monitor in &self.monitors {
            self.handles.push(tokio::spawn(Arc::clone(monitor).run()));
        }
    }

    /// Start and run until interrupted.
    pub async fn run(mut self) {
        self.start();
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, shutting down");
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
