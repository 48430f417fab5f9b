//! Startup-only environment parsing.
//!
//! Everything the process reads from the environment is read here, once,
//! into plain values handed to components by construction. Invalid values
//! are fatal; nothing re-reads the environment later.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use veridian_fetch::FetcherParams;

/// Chains the monitor knows out of the box. `${INFURA_ID}` is substituted
/// at startup; `CHAIN_RPC_<id>` overrides the URL outright.
const BUILTIN_CHAINS: &[(u64, &str, &str)] = &[
    (1, "mainnet", "https://mainnet.infura.io/v3/${INFURA_ID}"),
    (5, "goerli", "https://goerli.infura.io/v3/${INFURA_ID}"),
    (11155111, "sepolia", "https://sepolia.infura.io/v3/${INFURA_ID}"),
];

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    pub start_block: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub ipfs_url: String,
    pub swarm_url: String,
    pub fetcher: FetcherParams,
    pub get_block_pause: Duration,
    pub get_code_retry_pause: Duration,
    pub initial_get_bytecode_tries: u32,
    pub chains: Vec<ChainConfig>,
    pub repository_path: PathBuf,
    pub solc_repo: PathBuf,
    pub testing: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let fetcher = FetcherParams::default()
            .fetch_timeout(parse_millis(var("MONITOR_FETCH_TIMEOUT"), 300_000)?)
            .fetch_pause(parse_millis(var("MONITOR_FETCH_PAUSE"), 1_000)?)
            .cleanup_time(parse_millis(var("MONITOR_CLEANUP_PERIOD"), 1_800_000)?);

        let selected = parse_chain_selection(var("MONITOR_CHAINS"))?;
        let mut chains = Vec::new();
        for (chain_id, name, template) in BUILTIN_CHAINS {
            if let Some(selected) = &selected
                && !selected.contains(chain_id)
            {
                continue;
            }
            let rpc_url = match var(&format!("CHAIN_RPC_{chain_id}")) {
                Some(url) => url,
                None => expand_rpc_template(template)?,
            };
            chains.push(ChainConfig {
                chain_id: *chain_id,
                name: (*name).to_string(),
                rpc_url,
                start_block: parse_optional(var(&format!("MONITOR_START_{chain_id}")))?,
            });
        }

        let solc_repo = match var("SOLC_REPO") {
            Some(path) => PathBuf::from(path),
            None => home::home_dir()
                .map(|home| home.join(".veridian").join("solc-bin"))
                .unwrap_or_else(|| PathBuf::from("./solc-bin")),
        };

        Ok(Self {
            ipfs_url: var("IPFS_URL")
                .unwrap_or_else(|| veridian_fetch::gateway::DEFAULT_IPFS_URL.to_string()),
            swarm_url: var("SWARM_URL")
                .unwrap_or_else(|| veridian_fetch::gateway::DEFAULT_SWARM_URL.to_string()),
            fetcher,
            get_block_pause: parse_millis(var("GET_BLOCK_PAUSE"), 2_000)?,
            get_code_retry_pause: parse_millis(var("GET_CODE_RETRY_PAUSE"), 2_000)?,
            initial_get_bytecode_tries: parse_optional(var("INITIAL_GET_BYTECODE_TRIES"))?
                .unwrap_or(3),
            chains,
            repository_path: var("REPOSITORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./repository")),
            solc_repo,
            testing: var("TESTING").as_deref() == Some("true"),
        })
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_millis(value: Option<String>, default: u64) -> Result<Duration> {
    let millis = match value {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid millisecond value {raw:?}"))?,
        None => default,
    };
    Ok(Duration::from_millis(millis))
}

fn parse_optional<T>(value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid value {raw:?}"))
        })
        .transpose()
}

/// `MONITOR_CHAINS` narrows the watched set; unset watches every built-in.
fn parse_chain_selection(value: Option<String>) -> Result<Option<Vec<u64>>> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let ids = raw
                .split(',')
                .map(|part| {
                    part.trim()
                        .parse::<u64>()
                        .with_context(|| format!("invalid chain id {part:?} in MONITOR_CHAINS"))
                })
                .collect::<Result<Vec<u64>>>()?;
            if ids.is_empty() {
                bail!("MONITOR_CHAINS selects no chains");
            }
            Ok(Some(ids))
        }
    }
}

fn expand_rpc_template(template: &str) -> Result<String> {
    if !template.contains("${INFURA_ID}") {
        return Ok(template.to_string());
    }
    let infura_id =
        var("INFURA_ID").context("INFURA_ID is required for the built-in RPC URLs")?;
    Ok(template.replace("${INFURA_ID}", &infura_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millis() {
        assert_eq!(
            parse_millis(None, 2_000).unwrap(),
            Duration::from_millis(2_000)
        );
        assert_eq!(
            parse_millis(Some("500".to_string()), 2_000).unwrap(),
            Duration::from_millis(500)
        );
        assert!(parse_millis(Some("fast".to_string()), 2_000).is_err());
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional::<u64>(None).unwrap(), None);
        assert_eq!(
            parse_optional::<u64>(Some("9000000".to_string())).unwrap(),
            Some(9_000_000)
        );
        assert!(parse_optional::<u64>(Some("head".to_string())).is_err());
    }

    #[test]
    fn test_parse_chain_selection() {
        assert_eq!(parse_chain_selection(None).unwrap(), None);
        assert_eq!(
            parse_chain_selection(Some("1, 11155111".to_string())).unwrap(),
            Some(vec![1, 11155111])
        );
        assert!(parse_chain_selection(Some("mainnet".to_string())).is_err());
    }

    #[test]
    fn test_expand_rpc_template_passthrough() {
        assert_eq!(
            expand_rpc_template("https://rpc.example").unwrap(),
            "https://rpc.example"
        );
    }
}
