//! Error types for veridian-fetch.

use thiserror::Error;
use veridian_core::SourceOrigin;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no gateway registered for origin {0}")]
    NoGateway(SourceOrigin),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
