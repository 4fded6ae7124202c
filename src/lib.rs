pub mod config;
pub mod domain;
pub mod features;

#[cfg(test)]
mod test_support;

pub use crate::config::{default_network_profiles, NetworkProfile, SweepConfig};
pub use crate::domain::notice::{build_sweep_notice, SweepNotice};
pub use crate::domain::preflight::preflight_sweep;
pub use crate::domain::token_config::{validate_token_config, RawTokenConfig};
pub use crate::domain::types::{
    AgentRecord, AssetType, ConfigErrorReason, FailureCode, SweepContext, SweepFailure,
    SweepSummary, TokenConfigError, TokenDescriptor, TransferRecord, TransferStage,
    ValidatedTokenConfig,
};
pub use crate::features::{
    delete_agent_with_sweep, sweep_with_signer, AgentRecordStore, AgentRuntimeControl,
    ChainClient, ChainClientFactory, DeletionError, HttpChainClientFactory, KeyResolver,
    LocalKeySigner, SignerPort, SweepEngine, SweepGuardRegistry,
};
