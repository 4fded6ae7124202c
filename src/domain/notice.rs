use crate::domain::address::to_hex;
use crate::domain::types::SweepSummary;
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SweepNotice {
    pub title: String,
    pub subtitle: String,
    pub transfers: Vec<String>,
    pub destination: Option<String>,
}

fn short_address(value: &str) -> String {
    if value.len() < 12 {
        return value.to_string();
    }
    format!("{}...{}", &value[..6], &value[value.len() - 4..])
}

/// User-facing text shown after an agent and its wallet were deleted.
/// Returns `None` when there is no agent name to report on.
pub fn build_sweep_notice(agent_name: &str, summary: Option<&SweepSummary>) -> Option<SweepNotice> {
    let name = agent_name.trim();
    if name.is_empty() {
        return None;
    }
    let title = format!("{name} deleted");

    let Some(summary) = summary else {
        return Some(SweepNotice {
            title,
            subtitle: "Agent deletion completed. Sweep details were not returned.".to_string(),
            transfers: Vec::new(),
            destination: None,
        });
    };

    let destination = to_hex(&summary.destination);
    let transfers: Vec<String> = summary
        .transfers
        .iter()
        .map(|transfer| {
            format!(
                "{} {} ({} on {})",
                transfer.amount,
                transfer.symbol,
                transfer.asset_type.as_str(),
                transfer.network
            )
        })
        .collect();

    let subtitle = if transfers.is_empty() {
        "No transferable assets were found in the agent wallet.".to_string()
    } else {
        let label = if transfers.len() == 1 { "asset" } else { "assets" };
        format!(
            "Transferred {} {label} to {}.",
            transfers.len(),
            short_address(&destination)
        )
    };

    Some(SweepNotice {
        title,
        subtitle,
        transfers,
        destination: Some(destination),
    })
}
