pub mod chain;
pub mod deletion;
pub mod evm;
pub mod signer;
pub mod sweep;

pub use chain::{ChainClient, ChainClientFactory};
pub use deletion::{delete_agent_with_sweep, AgentRecordStore, AgentRuntimeControl, DeletionError};
pub use evm::{HttpChainClientFactory, HttpEvmChainClient, HttpEvmRpcClient, UreqTransport};
pub use signer::{KeyResolver, LocalKeySigner, SignerPort};
pub use sweep::{sweep_with_signer, SweepEngine, SweepGuard, SweepGuardRegistry};
