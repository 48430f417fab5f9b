//! Orchestration of compile, match and store.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use tracing::{debug, info};

use veridian_chain::ChainClient;
use veridian_core::metadata::{keccak_hex, normalize_hash};
use veridian_core::{CheckedContract, Metadata, SourceAddress};

use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::matcher::{MatchKind, match_bytecodes};
use crate::repository::RepositoryStore;

/// One user-supplied file: sources and metadata mixed, told apart by shape.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub content: String,
}

/// The single injection entry point's input.
pub enum InjectInput {
    /// Monitor-driven: an assembled contract with its bytecode already in
    /// hand.
    Assembled {
        contract: CheckedContract,
        bytecode: Bytes,
        chain: u64,
        address: Address,
    },
    /// User-driven: a flat file set to partition, pair and verify against
    /// each address.
    Files {
        files: Vec<InputFile>,
        chain: u64,
        addresses: Vec<Address>,
        /// Library name to address, injected into `settings.libraries`
        /// before recompilation.
        links: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone)]
pub struct InjectOutcome {
    pub address: Address,
    pub match_kind: MatchKind,
    pub stored_path: PathBuf,
}

pub struct Injector {
    repository: RepositoryStore,
    compiler: Arc<dyn Compiler>,
    chain_client: Option<Arc<dyn ChainClient>>,
}

impl Injector {
    pub fn new(
        repository: RepositoryStore,
        compiler: Arc<dyn Compiler>,
        chain_client: Arc<dyn ChainClient>,
    ) -> Self {
        Self {
            repository,
            compiler,
            chain_client: Some(chain_client),
        }
    }

    /// Repository-only injector for the monitor, which reads bytecode
    /// through its own chain client and supplies it with the input.
    pub fn offline(repository: RepositoryStore, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            repository,
            compiler,
            chain_client: None,
        }
    }

    /// Verify and archive. Returns one outcome per verified address;
    /// verification and input errors carry the user-facing message.
    ///
    /// Re-running with identical inputs returns the same outcomes and
    /// leaves the repository byte-identical.
    pub async fn inject(&self, input: InjectInput) -> Result<Vec<InjectOutcome>> {
        match input {
            InjectInput::Assembled {
                contract,
                bytecode,
                chain,
                address,
            } => {
                let outcome = self
                    .verify_and_store(contract, &bytecode, chain, address)
                    .await?;
                Ok(vec![outcome])
            }
            InjectInput::Files {
                files,
                chain,
                addresses,
                links,
            } => self.inject_files(files, chain, addresses, links).await,
        }
    }

    async fn inject_files(
        &self,
        files: Vec<InputFile>,
        chain: u64,
        addresses: Vec<Address>,
        links: BTreeMap<String, String>,
    ) -> Result<Vec<InjectOutcome>> {
        let (metadatas, sources) = partition_files(files)?;

        let mut outcomes = Vec::new();
        for address in addresses {
            let mut verified = None;
            let mut last_error = None;
            for (raw, metadata) in &metadatas {
                match self
                    .try_candidate(metadata.clone(), raw.clone(), &sources, &links, chain, address)
                    .await
                {
                    Ok(outcome) => {
                        verified = Some(outcome);
                        break;
                    }
                    Err(e) => {
                        debug!(%address, error = %e, "metadata candidate failed");
                        last_error = Some(e);
                    }
                }
            }
            match verified {
                Some(outcome) => outcomes.push(outcome),
                None => return Err(last_error.unwrap_or(Error::MissingMetadata)),
            }
        }
        Ok(outcomes)
    }

    async fn try_candidate(
        &self,
        mut metadata: Metadata,
        raw_metadata: Vec<u8>,
        files: &[InputFile],
        links: &BTreeMap<String, String>,
        chain: u64,
        address: Address,
    ) -> Result<InjectOutcome> {
        let sources = assemble_sources(&metadata, files)?;

        // Links go into the metadata before the contract is sealed, so
        // recompilation and the archived document agree.
        let raw_metadata = if links.is_empty() {
            raw_metadata
        } else {
            metadata.link_libraries(links);
            metadata.to_canonical_json()?
        };
        let contract = CheckedContract::new(metadata, raw_metadata, sources)?;

        let bytecode = self.fetch_bytecode(chain, address).await?;
        self.verify_and_store(contract, &bytecode, chain, address)
            .await
    }

    async fn fetch_bytecode(&self, chain: u64, address: Address) -> Result<Bytes> {
        let client = self.chain_client.as_ref().ok_or(Error::NoChainClient)?;
        let code = client.get_code(address).await?;
        if code.is_empty() {
            return Err(Error::EmptyBytecode { chain, address });
        }
        Ok(code)
    }

    async fn verify_and_store(
        &self,
        contract: CheckedContract,
        onchain: &[u8],
        chain: u64,
        address: Address,
    ) -> Result<InjectOutcome> {
        let recompiled = self.compiler.compile(&contract).await?;
        let match_kind = match_bytecodes(onchain, &recompiled.runtime_bytecode);

        let stored_path = match match_kind {
            MatchKind::Perfect => match SourceAddress::from_bytecode(onchain) {
                Ok(metadata_address) => self
                    .repository
                    .store_perfect(&metadata_address, &contract.raw_metadata)?,
                Err(e) => {
                    // Perfect code match but no readable metadata pointer;
                    // the per-address layout still identifies it.
                    debug!(%address, error = %e, "no auxdata pointer on perfect match");
                    self.repository
                        .store_partial(chain, address, &contract.raw_metadata)?
                }
            },
            MatchKind::Partial => {
                self.repository
                    .store_partial(chain, address, &contract.raw_metadata)?
            }
            MatchKind::None => {
                return Err(Error::BytecodeMismatch {
                    sources: contract.source_names().join(", "),
                });
            }
        };

        for source in contract.sources.values() {
            self.repository
                .store_source(&source.keccak256, &source.content)?;
        }

        info!(
            chain,
            %address,
            contract = %contract.name,
            result = %match_kind,
            path = %stored_path.display(),
            "verified"
        );
        Ok(InjectOutcome {
            address,
            match_kind,
            stored_path,
        })
    }
}

/// Split user files into metadata documents and source candidates. A file
/// is metadata iff it parses with the required shape.
fn partition_files(files: Vec<InputFile>) -> Result<(Vec<(Vec<u8>, Metadata)>, Vec<InputFile>)> {
    let mut metadatas = Vec::new();
    let mut sources = Vec::new();
    for file in files {
        match Metadata::parse(file.content.as_bytes()) {
            Ok(metadata) => metadatas.push((file.content.into_bytes(), metadata)),
            Err(_) => sources.push(file),
        }
    }
    if metadatas.is_empty() {
        return Err(Error::MissingMetadata);
    }
    Ok((metadatas, sources))
}

/// Satisfy every metadata-declared source from inline content or from the
/// supplied files, matched by keccak256.
fn assemble_sources(metadata: &Metadata, files: &[InputFile]) -> Result<BTreeMap<String, String>> {
    let by_hash: HashMap<String, &str> = files
        .iter()
        .map(|f| (keccak_hex(f.content.as_bytes()), f.content.as_str()))
        .collect();

    let mut sources = BTreeMap::new();
    for (name, declared) in metadata.sources() {
        let content = match &declared.content {
            Some(inline) => inline.as_str(),
            None => by_hash
                .get(&normalize_hash(&declared.keccak256))
                .copied()
                .ok_or_else(|| Error::SourceNotFound {
                    name: name.clone(),
                    hash: declared.keccak256.clone(),
                })?,
        };
        sources.insert(name.clone(), content.to_string());
    }
    Ok(sources)
}
