//! Error types for veridian-core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bytecode carries no auxdata tail")]
    MissingAuxdata,

    #[error("malformed auxdata: {0}")]
    MalformedAuxdata(String),

    #[error("auxdata carries no recognized content address")]
    NoContentAddress,

    #[error("unknown content-address origin: {0}")]
    UnknownOrigin(String),

    #[error("unparseable source URL: {0}")]
    BadSourceUrl(String),

    #[error("invalid metadata document: {0}")]
    InvalidMetadata(String),

    #[error("source {name}: declared keccak256 {declared} does not match content hash {computed}")]
    SourceHashMismatch {
        name: String,
        declared: String,
        computed: String,
    },

    #[error("source {0} is declared in metadata but was not provided")]
    SourceMissing(String),

    #[error("metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
}
