//! A fully assembled compilation input.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::metadata::{self, Metadata};

/// One source file whose content hash has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedSource {
    pub content: String,
    /// keccak256 of `content`, lowercase hex without `0x`.
    pub keccak256: String,
}

/// The verified input handed to recompilation: metadata plus every source
/// it declares, each with a matching keccak256.
///
/// Construction is the only way to obtain one, so holders can rely on the
/// hashes having been checked.
#[derive(Debug, Clone)]
pub struct CheckedContract {
    /// Contract name, taken from the metadata compilation target.
    pub name: String,
    pub metadata: Metadata,
    /// The exact metadata bytes as received; this is what gets archived.
    pub raw_metadata: Vec<u8>,
    pub sources: BTreeMap<String, VerifiedSource>,
}

impl CheckedContract {
    /// Build from metadata and source texts keyed by logical name.
    ///
    /// Every source declared in the metadata must be present in `sources`
    /// and hash to its declared keccak256; a mismatch or absence fails the
    /// whole contract.
    pub fn new(
        metadata: Metadata,
        raw_metadata: Vec<u8>,
        sources: BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut verified = BTreeMap::new();
        for (name, declared) in metadata.sources() {
            let content = sources
                .get(name)
                .ok_or_else(|| Error::SourceMissing(name.clone()))?;
            metadata::verify_source_hash(name, &declared.keccak256, content)?;
            verified.insert(
                name.clone(),
                VerifiedSource {
                    content: content.clone(),
                    keccak256: metadata::normalize_hash(&declared.keccak256),
                },
            );
        }

        let name = metadata.compilation_target().name.clone();
        Ok(Self {
            name,
            metadata,
            raw_metadata,
            sources: verified,
        })
    }

    /// Source logical names, for error reporting.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::sample_metadata_json;

    #[test]
    fn test_new_verifies_hashes() {
        let content = "pragma solidity ^0.6.0; contract Simple {}";
        let raw = sample_metadata_json(None);
        let metadata = Metadata::parse(raw.as_bytes()).unwrap();

        let sources = BTreeMap::from([("Simple.sol".to_string(), content.to_string())]);
        let contract =
            CheckedContract::new(metadata, raw.clone().into_bytes(), sources).unwrap();
        assert_eq!(contract.name, "Simple");
        assert_eq!(contract.sources.len(), 1);
        assert_eq!(contract.raw_metadata, raw.into_bytes());
    }

    #[test]
    fn test_new_rejects_hash_mismatch() {
        let raw = sample_metadata_json(None);
        let metadata = Metadata::parse(raw.as_bytes()).unwrap();

        let sources = BTreeMap::from([("Simple.sol".to_string(), "tampered".to_string())]);
        assert!(matches!(
            CheckedContract::new(metadata, raw.into_bytes(), sources),
            Err(Error::SourceHashMismatch { .. })
        ));
    }

    #[test]
    fn test_new_rejects_missing_source() {
        let raw = sample_metadata_json(None);
        let metadata = Metadata::parse(raw.as_bytes()).unwrap();
        assert!(matches!(
            CheckedContract::new(metadata, raw.into_bytes(), BTreeMap::new()),
            Err(Error::SourceMissing(_))
        ));
    }
}
