use crate::domain::types::{SettlingAsset, SweepEvent, SweepState, TransitionError};

pub fn transition(current: &SweepState, event: &SweepEvent) -> Result<SweepState, TransitionError> {
    match (current, event) {
        (SweepState::Idle, SweepEvent::Begin) => Ok(SweepState::Preflight),
        (SweepState::Preflight, SweepEvent::PreflightPassed) => Ok(SweepState::ContextReady),
        (SweepState::Preflight, SweepEvent::PreflightDenied { code }) => {
            Ok(SweepState::Denied { code: *code })
        }
        (
            SweepState::ContextReady | SweepState::Settling { .. },
            SweepEvent::SettleToken { network, symbol },
        ) => Ok(SweepState::Settling {
            network: network.clone(),
            asset: SettlingAsset::Token {
                symbol: symbol.clone(),
            },
        }),
        (
            SweepState::ContextReady | SweepState::Settling { .. },
            SweepEvent::SettleNative { network },
        ) => Ok(SweepState::Settling {
            network: network.clone(),
            asset: SettlingAsset::Native,
        }),
        (
            SweepState::ContextReady | SweepState::Settling { .. },
            SweepEvent::StepFailed { code },
        ) => Ok(SweepState::Failed { code: *code }),
        (SweepState::ContextReady | SweepState::Settling { .. }, SweepEvent::Completed) => {
            Ok(SweepState::Settled)
        }
        _ => Err(TransitionError {
            from: current.clone(),
            event: format!("{event:?}"),
            reason: "invalid transition".to_string(),
        }),
    }
}

pub fn is_terminal(state: &SweepState) -> bool {
    matches!(
        state,
        SweepState::Denied { .. } | SweepState::Failed { .. } | SweepState::Settled
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FailureCode;

    #[test]
    fn happy_path_walks_preflight_settling_settled() {
        let state = transition(&SweepState::Idle, &SweepEvent::Begin).unwrap();
        assert_eq!(state, SweepState::Preflight);
        let state = transition(&state, &SweepEvent::PreflightPassed).unwrap();
        assert_eq!(state, SweepState::ContextReady);
        let state = transition(
            &state,
            &SweepEvent::SettleToken {
                network: "mantle".to_string(),
                symbol: "USDC".to_string(),
            },
        )
        .unwrap();
        let state = transition(
            &state,
            &SweepEvent::SettleNative {
                network: "mantle".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            state,
            SweepState::Settling {
                network: "mantle".to_string(),
                asset: SettlingAsset::Native,
            }
        );
        let state = transition(&state, &SweepEvent::Completed).unwrap();
        assert_eq!(state, SweepState::Settled);
        assert!(is_terminal(&state));
    }

    #[test]
    fn denied_and_failed_are_terminal() {
        let denied = transition(
            &SweepState::Preflight,
            &SweepEvent::PreflightDenied {
                code: FailureCode::MissingCreatorAddress,
            },
        )
        .unwrap();
        assert!(is_terminal(&denied));
        assert!(transition(&denied, &SweepEvent::PreflightPassed).is_err());

        let failed = transition(
            &SweepState::ContextReady,
            &SweepEvent::StepFailed {
                code: FailureCode::AssetTransferFailed,
            },
        )
        .unwrap();
        assert!(is_terminal(&failed));
        assert!(transition(
            &failed,
            &SweepEvent::SettleNative {
                network: "mantle".to_string()
            }
        )
        .is_err());
    }

    #[test]
    fn settling_requires_a_passed_preflight() {
        let error = transition(
            &SweepState::Preflight,
            &SweepEvent::SettleNative {
                network: "mantle".to_string(),
            },
        )
        .expect_err("settling before preflight passes must be rejected");
        assert_eq!(error.from, SweepState::Preflight);
        assert_eq!(error.reason, "invalid transition");
    }
}
