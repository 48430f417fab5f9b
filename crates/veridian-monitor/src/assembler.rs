//! Assembly of one contract's compilable bundle from the fetcher.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use veridian_core::metadata;
use veridian_core::{CheckedContract, Metadata, SourceAddress};
use veridian_fetch::SourceFetcher;

#[derive(Debug, Error)]
pub enum AssembleError {
    /// A subscription aged out before its document arrived. The contract
    /// will be rediscovered on a future block scan.
    #[error("subscription expired before completion")]
    Expired,

    #[error("source {0} has no resolvable URL")]
    NoResolvableUrl(String),

    #[error("source {0} is not valid UTF-8")]
    NotUtf8(String),

    #[error(transparent)]
    Fetch(#[from] veridian_fetch::Error),

    #[error(transparent)]
    Core(#[from] veridian_core::Error),
}

/// Walks the metadata graph for single contracts: the metadata document
/// first, then every source it references, until a complete bundle exists.
/// Assembly only materializes inputs; it never verifies or persists.
pub struct ContractAssembler {
    fetcher: Arc<SourceFetcher>,
}

impl ContractAssembler {
    pub fn new(fetcher: Arc<SourceFetcher>) -> Self {
        Self { fetcher }
    }

    /// Assemble the contract behind a metadata pointer.
    ///
    /// Resolves once every required artifact has arrived and hash-checked;
    /// errors if any piece is unfetchable, expired or fails its keccak256.
    pub async fn assemble(
        &self,
        metadata_address: SourceAddress,
    ) -> Result<CheckedContract, AssembleError> {
        let raw_metadata = self
            .fetcher
            .subscribe(&metadata_address)
            .await?
            .await
            .map_err(|_| AssembleError::Expired)?;
        let metadata = Metadata::parse(&raw_metadata)?;
        debug!(
            metadata = %metadata_address,
            target = %metadata.compilation_target().name,
            sources = metadata.sources().len(),
            "metadata fetched"
        );

        // Subscribe to everything missing before awaiting anything, so the
        // fetcher works all sources concurrently.
        let mut sources = BTreeMap::new();
        let mut pending = Vec::new();
        for (name, declared) in metadata.sources() {
            if let Some(content) = &declared.content {
                // Inline content is accepted only once its hash checks out.
                metadata::verify_source_hash(name, &declared.keccak256, content)?;
                sources.insert(name.clone(), content.clone());
                continue;
            }
            let address = declared
                .urls
                .iter()
                .find_map(|url| SourceAddress::from_url(url).ok())
                .ok_or_else(|| AssembleError::NoResolvableUrl(name.clone()))?;
            pending.push((name.clone(), self.fetcher.subscribe(&address).await?));
        }

        for (name, ticket) in pending {
            let bytes = ticket.await.map_err(|_| AssembleError::Expired)?;
            let content =
                String::from_utf8(bytes.to_vec()).map_err(|_| AssembleError::NotUtf8(name.clone()))?;
            sources.insert(name, content);
        }

        Ok(CheckedContract::new(
            metadata,
            raw_metadata.to_vec(),
            sources,
        )?)
    }
}
