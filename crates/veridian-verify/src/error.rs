//! Error types for veridian-verify.

use std::io;
use std::path::PathBuf;

use alloy_primitives::Address;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported compiler version: no solc binary for {0}")]
    UnsupportedVersion(String),

    #[error("invalid compiler version {version}: {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },

    #[error("compilation failed:\n{0}")]
    CompilationFailed(String),

    #[error("compiler output carries no contract {path}:{name}")]
    TargetMissing { path: String, name: String },

    #[error("unlinked library placeholder in recompiled bytecode: {0}")]
    UnlinkedLibrary(String),

    #[error("compiler process: {0}")]
    CompilerIo(#[source] io::Error),

    #[error("invalid compiler output: {0}")]
    CompilerOutput(String),

    #[error("Metadata file not found. Did you include \"metadata.json\"?")]
    MissingMetadata,

    #[error("Source file {name} with keccak256 {hash} cannot be found among the supplied files")]
    SourceNotFound { name: String, hash: String },

    #[error("Could not match on-chain deployed bytecode to the recompiled output of {sources}")]
    BytecodeMismatch { sources: String },

    #[error("no deployed bytecode at {address} on chain {chain}")]
    EmptyBytecode { chain: u64, address: Address },

    #[error("user-driven verification requires a chain client")]
    NoChainClient,

    #[error("repository key {0} is not a plain file name")]
    InvalidKey(String),

    #[error("repository write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Core(#[from] veridian_core::Error),

    #[error(transparent)]
    Chain(#[from] veridian_chain::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}
