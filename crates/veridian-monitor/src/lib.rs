//! Chain watching: discover contract creations, assemble their sources,
//! hand them to verification.
//!
//! # Architecture
//!
//! - `assembler` - walks one contract's metadata graph into a
//!   [`veridian_core::CheckedContract`]
//! - `chain_monitor` - the per-chain block loop
//! - `monitor` - lifecycle owner of the shared fetcher, assembler,
//!   injector and every chain monitor

pub mod assembler;
pub mod chain_monitor;
pub mod monitor;

pub use assembler::{AssembleError, ContractAssembler};
pub use chain_monitor::{ChainMonitor, ChainMonitorParams};
pub use monitor::{ChainSpec, Monitor};
