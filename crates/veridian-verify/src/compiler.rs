//! Recompilation through the exact compiler version a metadata declares.
//!
//! The compiler is an external tool selected by its full version
//! fingerprint (`0.6.2+commit.bacdbe57`). Input is rebuilt from the
//! metadata `settings` verbatim with the verified sources overlaid, fed to
//! `solc --standard-json`, and the deployed bytecode plus the compiler's
//! own metadata echo are extracted for the single compilation target.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use veridian_core::CheckedContract;

use crate::error::{Error, Result};

/// Result of one recompilation.
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub runtime_bytecode: Vec<u8>,
    /// The compiler's metadata output for the target; byte-stable for
    /// identical inputs and the canonical form to hash.
    pub metadata: String,
}

#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, contract: &CheckedContract) -> Result<CompiledContract>;
}

/// `Compiler` over versioned solc binaries.
///
/// Binaries are looked up as `solc-v<version>` in the configured
/// directory, with `PATH` as fallback. Each invocation runs in its own
/// temporary working directory so concurrent recompilations stay isolated.
pub struct SolcCompiler {
    solc_repo: PathBuf,
}

impl SolcCompiler {
    pub fn new(solc_repo: impl Into<PathBuf>) -> Self {
        Self {
            solc_repo: solc_repo.into(),
        }
    }

    fn resolve_binary(&self, version: &str) -> Result<PathBuf> {
        semver::Version::parse(version).map_err(|source| Error::InvalidVersion {
            version: version.to_string(),
            source,
        })?;

        let name = format!("solc-v{version}");
        let candidate = self.solc_repo.join(&name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        which::which(&name).map_err(|_| Error::UnsupportedVersion(version.to_string()))
    }

    /// Standard-JSON input: metadata settings verbatim, minus the
    /// `compilationTarget` marker solc does not accept back, with the
    /// output selection pinned to what the matcher needs.
    fn build_input(contract: &CheckedContract) -> Value {
        let mut settings = contract.metadata.settings().clone();
        if let Some(settings) = settings.as_object_mut() {
            settings.remove("compilationTarget");
            settings.insert(
                "outputSelection".to_string(),
                json!({"*": {"*": ["evm.deployedBytecode", "metadata"]}}),
            );
        }

        let sources: Value = contract
            .sources
            .iter()
            .map(|(name, source)| (name.clone(), json!({"content": source.content})))
            .collect::<serde_json::Map<_, _>>()
            .into();

        json!({
            "language": "Solidity",
            "sources": sources,
            "settings": settings,
        })
    }
}

#[async_trait]
impl Compiler for SolcCompiler {
    async fn compile(&self, contract: &CheckedContract) -> Result<CompiledContract> {
        let version = contract.metadata.compiler_version();
        let binary = self.resolve_binary(version)?;
        let input = serde_json::to_vec(&Self::build_input(contract))?;

        let workspace = tempfile::tempdir().map_err(Error::CompilerIo)?;
        debug!(
            contract = %contract.name,
            compiler = %binary.display(),
            workspace = %workspace.path().display(),
            "recompiling"
        );

        let mut child = Command::new(&binary)
            .arg("--standard-json")
            .current_dir(workspace.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::CompilerIo)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.map_err(Error::CompilerIo)?;
        }
        let output = child.wait_with_output().await.map_err(Error::CompilerIo)?;

        // solc reports problems inside the JSON; a non-JSON stdout means
        // the process itself failed.
        let output: Value = serde_json::from_slice(&output.stdout).map_err(|_| {
            Error::CompilerOutput(String::from_utf8_lossy(&output.stderr).into_owned())
        })?;
        if let Some(errors) = output["errors"].as_array() {
            let fatal: Vec<&str> = errors
                .iter()
                .filter(|e| e["severity"] == "error")
                .filter_map(|e| {
                    e["formattedMessage"].as_str().or_else(|| e["message"].as_str())
                })
                .collect();
            if !fatal.is_empty() {
                return Err(Error::CompilationFailed(fatal.join("\n")));
            }
        }

        let target = contract.metadata.compilation_target();
        let entry = &output["contracts"][&target.path][&target.name];
        let object = entry["evm"]["deployedBytecode"]["object"]
            .as_str()
            .ok_or_else(|| Error::TargetMissing {
                path: target.path.clone(),
                name: target.name.clone(),
            })?;

        if let Some(position) = object.find("__") {
            let end = (position + 40).min(object.len());
            return Err(Error::UnlinkedLibrary(object[position..end].to_string()));
        }
        let runtime_bytecode = hex::decode(object.trim_start_matches("0x"))
            .map_err(|e| Error::CompilerOutput(format!("deployed bytecode: {e}")))?;

        let metadata = entry["metadata"]
            .as_str()
            .ok_or_else(|| Error::CompilerOutput("missing metadata output".to_string()))?
            .to_string();

        Ok(CompiledContract {
            runtime_bytecode,
            metadata,
        })
    }
}
