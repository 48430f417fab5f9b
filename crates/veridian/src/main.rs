//! veridian: verify deployed contracts against their published sources
//! and archive the proven bundles in a content-addressed repository.

mod config;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use veridian_chain::JsonRpcClient;
use veridian_fetch::{GatewaySet, ReqwestFetchClient, SourceFetcher};
use veridian_monitor::{ChainMonitorParams, ChainSpec, Monitor};
use veridian_verify::{InjectInput, Injector, InputFile, RepositoryStore, SolcCompiler};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "veridian", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch configured chains and archive every verifiable contract
    /// creation.
    Monitor,
    /// Verify supplied sources and metadata against deployed addresses.
    Verify {
        /// Chain id the addresses live on.
        #[arg(long)]
        chain: u64,
        /// Deployed address; repeatable.
        #[arg(long = "address", required = true)]
        addresses: Vec<Address>,
        /// Library link as Name=0xaddress; repeatable.
        #[arg(long = "lib")]
        libs: Vec<String>,
        /// Metadata and source files, in any order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Monitor => run_monitor(config).await,
        Command::Verify {
            chain,
            addresses,
            libs,
            files,
        } => run_verify(config, chain, addresses, libs, files).await,
    }
}

async fn run_monitor(config: Config) -> Result<()> {
    if config.testing {
        bail!("TESTING is set, the monitor refuses to start");
    }
    if config.chains.is_empty() {
        bail!("no chains configured");
    }

    let gateways = GatewaySet::with_defaults(config.ipfs_url.as_str(), config.swarm_url.as_str());
    let fetcher = SourceFetcher::new(config.fetcher.clone(), gateways, ReqwestFetchClient::new()?);
    let injector = Injector::offline(
        RepositoryStore::new(&config.repository_path),
        Arc::new(SolcCompiler::new(&config.solc_repo)),
    );

    let mut chains = Vec::new();
    for chain in &config.chains {
        tracing::info!(
            chain = chain.chain_id,
            name = %chain.name,
            start = ?chain.start_block,
            "configured"
        );
        chains.push(ChainSpec {
            chain_id: chain.chain_id,
            client: Arc::new(
                JsonRpcClient::new(chain.rpc_url.as_str())
                    .with_context(|| format!("RPC client for chain {}", chain.chain_id))?,
            ),
            params: ChainMonitorParams::default()
                .start_block(chain.start_block)
                .get_block_pause(config.get_block_pause)
                .get_code_retry_pause(config.get_code_retry_pause)
                .initial_get_bytecode_tries(config.initial_get_bytecode_tries),
        });
    }

    Monitor::new(fetcher, injector, chains).run().await;
    Ok(())
}

async fn run_verify(
    config: Config,
    chain: u64,
    addresses: Vec<Address>,
    libs: Vec<String>,
    files: Vec<PathBuf>,
) -> Result<()> {
    let chain_config = config
        .chains
        .iter()
        .find(|c| c.chain_id == chain)
        .with_context(|| format!("chain {chain} is not configured"))?;
    let client = Arc::new(JsonRpcClient::new(chain_config.rpc_url.as_str())?);
    let injector = Injector::new(
        RepositoryStore::new(&config.repository_path),
        Arc::new(SolcCompiler::new(&config.solc_repo)),
        client,
    );

    let links = libs
        .iter()
        .map(|spec| {
            spec.split_once('=')
                .map(|(name, address)| (name.to_string(), address.to_string()))
                .with_context(|| format!("--lib {spec} is not of the form Name=0xaddress"))
        })
        .collect::<Result<BTreeMap<_, _>>>()?;

    let input_files = files
        .iter()
        .map(|path| {
            Ok(InputFile {
                name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                content: fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let outcomes = injector
        .inject(InjectInput::Files {
            files: input_files,
            chain,
            addresses,
            links,
        })
        .await?;

    for outcome in outcomes {
        println!(
            "{:#x}  {}  {}",
            outcome.address,
            outcome.match_kind,
            outcome.stored_path.display()
        );
    }
    Ok(())
}
