//! The Solidity compiler metadata document.
//!
//! Metadata fully describes one deterministic compilation: compiler version,
//! the complete settings block, and every source with its keccak256. The
//! document is kept as raw JSON so callers that need a verbatim echo (the
//! compiler input reconstruction, the repository) get exactly what was
//! parsed; typed accessors sit on top for the fields the pipeline reads.

use std::collections::BTreeMap;

use alloy_primitives::keccak256;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// The single `file:contract` pair a metadata document targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationTarget {
    /// Source logical name, e.g. `contracts/Simple.sol`.
    pub path: String,
    /// Contract name within that source.
    pub name: String,
}

/// One entry of the metadata `sources` map.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataSource {
    pub keccak256: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Metadata {
    doc: Value,
    compiler_version: String,
    target: CompilationTarget,
    sources: BTreeMap<String, MetadataSource>,
}

impl Metadata {
    /// Parse and validate a metadata document.
    ///
    /// The required shape is `compiler.version` (string),
    /// `settings.compilationTarget` (single-entry object) and `sources`
    /// (object). Anything else in the document is preserved untouched.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc: Value = serde_json::from_slice(bytes)?;

        let compiler_version = doc
            .pointer("/compiler/version")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidMetadata("missing compiler.version".to_string()))?
            .to_string();
        if compiler_version.is_empty() {
            return Err(Error::InvalidMetadata("empty compiler.version".to_string()));
        }

        let target_map = doc
            .pointer("/settings/compilationTarget")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                Error::InvalidMetadata("missing settings.compilationTarget".to_string())
            })?;
        let mut targets = target_map.iter();
        let target = match (targets.next(), targets.next()) {
            (Some((path, name)), None) => CompilationTarget {
                path: path.clone(),
                name: name
                    .as_str()
                    .ok_or_else(|| {
                        Error::InvalidMetadata("compilationTarget value is not a string".to_string())
                    })?
                    .to_string(),
            },
            (None, _) => {
                return Err(Error::InvalidMetadata("empty compilationTarget".to_string()));
            }
            _ => {
                return Err(Error::InvalidMetadata(
                    "more than one compilationTarget entry".to_string(),
                ));
            }
        };

        let sources_value = doc
            .get("sources")
            .cloned()
            .ok_or_else(|| Error::InvalidMetadata("missing sources".to_string()))?;
        let sources: BTreeMap<String, MetadataSource> = serde_json::from_value(sources_value)?;
        if sources.is_empty() {
            return Err(Error::InvalidMetadata("empty sources".to_string()));
        }

        Ok(Self {
            doc,
            compiler_version,
            target,
            sources,
        })
    }

    pub fn compiler_version(&self) -> &str {
        &self.compiler_version
    }

    pub fn compilation_target(&self) -> &CompilationTarget {
        &self.target
    }

    pub fn sources(&self) -> &BTreeMap<String, MetadataSource> {
        &self.sources
    }

    /// The full `settings` block, verbatim.
    pub fn settings(&self) -> &Value {
        &self.doc["settings"]
    }

    pub fn as_value(&self) -> &Value {
        &self.doc
    }

    /// Inject library link addresses into `settings.libraries`.
    ///
    /// Keys are library names (not source paths); addresses are stored
    /// lowercase. Existing entries for the same name are replaced.
    pub fn link_libraries(&mut self, links: &BTreeMap<String, String>) {
        if links.is_empty() {
            return;
        }
        let Some(settings) = self.doc.get_mut("settings").and_then(Value::as_object_mut) else {
            return;
        };
        let libraries = settings
            .entry("libraries")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(libraries) = libraries.as_object_mut() {
            for (name, address) in links {
                libraries.insert(
                    name.clone(),
                    Value::String(address.to_ascii_lowercase()),
                );
            }
        }
    }

    /// Serialize back to canonical JSON: compact, keys sorted, the same
    /// form the compiler itself emits.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.doc)?)
    }
}

/// Lowercase hex without a `0x` prefix, the canonical hash spelling here.
pub fn normalize_hash(hash: &str) -> String {
    hash.trim()
        .trim_start_matches("0x")
        .to_ascii_lowercase()
}

/// keccak256 of `content`, in canonical spelling.
pub fn keccak_hex(content: &[u8]) -> String {
    hex::encode(keccak256(content))
}

/// Check a source text against its metadata-declared keccak256.
pub fn verify_source_hash(name: &str, declared: &str, content: &str) -> Result<()> {
    let computed = keccak_hex(content.as_bytes());
    if normalize_hash(declared) != computed {
        return Err(Error::SourceHashMismatch {
            name: name.to_string(),
            declared: declared.to_string(),
            computed,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_metadata_json(source_content: Option<&str>) -> String {
        let source = match source_content {
            Some(content) => format!(
                r#"{{"keccak256":"0x{}","content":{}}}"#,
                keccak_hex(content.as_bytes()),
                serde_json::to_string(content).unwrap()
            ),
            None => {
                let content = "pragma solidity ^0.6.0; contract Simple {}";
                format!(
                    r#"{{"keccak256":"0x{}","urls":["dweb:/ipfs/QmSourceHash"]}}"#,
                    keccak_hex(content.as_bytes())
                )
            }
        };
        format!(
            r#"{{"compiler":{{"version":"0.6.2+commit.bacdbe57"}},"language":"Solidity","settings":{{"compilationTarget":{{"Simple.sol":"Simple"}},"evmVersion":"istanbul","optimizer":{{"enabled":false,"runs":200}}}},"sources":{{"Simple.sol":{source}}},"version":1}}"#
        )
    }

    #[test]
    fn test_parse() {
        let raw = sample_metadata_json(None);
        let metadata = Metadata::parse(raw.as_bytes()).unwrap();
        assert_eq!(metadata.compiler_version(), "0.6.2+commit.bacdbe57");
        assert_eq!(metadata.compilation_target().path, "Simple.sol");
        assert_eq!(metadata.compilation_target().name, "Simple");
        assert_eq!(metadata.sources().len(), 1);
        assert_eq!(
            metadata.sources()["Simple.sol"].urls,
            vec!["dweb:/ipfs/QmSourceHash"]
        );
    }

    #[test]
    fn test_parse_rejects_missing_compiler_version() {
        let raw = r#"{"settings":{"compilationTarget":{"A.sol":"A"}},"sources":{}}"#;
        assert!(Metadata::parse(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_rejects_multiple_targets() {
        let raw = r#"{"compiler":{"version":"0.6.2"},"settings":{"compilationTarget":{"A.sol":"A","B.sol":"B"}},"sources":{"A.sol":{"keccak256":"0x00"}}}"#;
        assert!(Metadata::parse(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_canonical_json_is_sorted_and_stable() {
        // Keys deliberately out of order.
        let raw = r#"{"sources":{"A.sol":{"keccak256":"0x00"}},"compiler":{"version":"0.6.2"},"settings":{"compilationTarget":{"A.sol":"A"}}}"#;
        let metadata = Metadata::parse(raw.as_bytes()).unwrap();
        let canonical = metadata.to_canonical_json().unwrap();
        let text = String::from_utf8(canonical.clone()).unwrap();
        assert!(text.starts_with(r#"{"compiler""#));

        let reparsed = Metadata::parse(&canonical).unwrap();
        assert_eq!(reparsed.to_canonical_json().unwrap(), canonical);
    }

    #[test]
    fn test_link_libraries() {
        let raw = sample_metadata_json(None);
        let mut metadata = Metadata::parse(raw.as_bytes()).unwrap();
        let links = BTreeMap::from([(
            "Library".to_string(),
            "0xABCDEF0123456789abcdef0123456789ABCDEF01".to_string(),
        )]);
        metadata.link_libraries(&links);
        assert_eq!(
            metadata
                .as_value()
                .pointer("/settings/libraries/Library")
                .and_then(Value::as_str),
            Some("0xabcdef0123456789abcdef0123456789abcdef01")
        );
    }

    #[test]
    fn test_verify_source_hash() {
        let content = "contract A {}";
        let declared = format!("0x{}", keccak_hex(content.as_bytes()));
        verify_source_hash("A.sol", &declared, content).unwrap();
        assert!(verify_source_hash("A.sol", &declared, "contract B {}").is_err());
    }

    #[test]
    fn test_normalize_hash() {
        assert_eq!(normalize_hash("0xAB12"), "ab12");
        assert_eq!(normalize_hash(" ab12 "), "ab12");
    }
}
