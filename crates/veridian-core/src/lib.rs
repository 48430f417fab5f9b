//! Shared domain model for contract source verification.
//!
//! This crate carries the pure, I/O-free pieces every other crate builds on:
//! - `address` - content addresses (IPFS, Swarm) and their extraction from
//!   the auxdata tail of deployed runtime bytecode
//! - `bytecode` - splitting and stripping the trailing metadata section
//! - `metadata` - the Solidity compiler metadata document
//! - `contract` - a fully assembled, hash-verified compilation input

mod error;

pub mod address;
pub mod bytecode;
pub mod contract;
pub mod metadata;

pub use address::{SourceAddress, SourceOrigin};
pub use contract::{CheckedContract, VerifiedSource};
pub use error::{Error, Result};
pub use metadata::{CompilationTarget, Metadata, MetadataSource};
