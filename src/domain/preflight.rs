use crate::domain::address::parse_nonzero_address;
use crate::domain::token_config::{validate_token_config, RawTokenConfig};
use crate::domain::types::{AgentRecord, FailureCode, SweepContext, SweepFailure};
use serde_json::json;

/// Checks the destination and the token configuration before any chain I/O.
pub fn preflight_sweep(
    record: &AgentRecord,
    token_config: &RawTokenConfig,
    networks: &[&str],
) -> Result<SweepContext, SweepFailure> {
    let creator_address = record
        .creator_address
        .as_deref()
        .filter(|address| !address.trim().is_empty())
        .ok_or_else(|| {
            SweepFailure::new(
                FailureCode::MissingCreatorAddress,
                "Creator address is required before deleting an agent with asset sweep enabled.",
                json!({ "agentId": record.id, "reason": "CREATOR_ADDRESS_MISSING" }),
            )
        })?;

    let destination = parse_nonzero_address(creator_address).map_err(|_| {
        SweepFailure::new(
            FailureCode::InvalidCreatorAddress,
            "Creator address is invalid. Cannot sweep assets before deletion.",
            json!({ "agentId": record.id, "creatorAddress": creator_address }),
        )
    })?;

    let tokens = validate_token_config(token_config, networks)
        .map_err(|config_error| config_error.into_failure())?;

    Ok(SweepContext::new(destination, tokens))
}
