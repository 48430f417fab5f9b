//! Verification of assembled contracts against on-chain bytecode.
//!
//! # Architecture
//!
//! - `compiler` - exact-version solc selection and standard-JSON invocation
//! - `matcher` - the perfect and metadata-stripped equality relations
//! - `repository` - the content-addressed on-disk archive
//! - `injector` - orchestration: compile, match, store
//!
//! The injector is the only public boundary where verification errors are
//! surfaced to callers; everything upstream logs and retries.

mod error;

pub mod compiler;
pub mod injector;
pub mod matcher;
pub mod repository;

pub use compiler::{CompiledContract, Compiler, SolcCompiler};
pub use error::{Error, Result};
pub use injector::{InjectInput, InjectOutcome, Injector, InputFile};
pub use matcher::{MatchKind, match_bytecodes};
pub use repository::RepositoryStore;
