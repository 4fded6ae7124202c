use alloy_primitives::U256;

/// Headroom applied over point-in-time gas estimates: 120% of the estimate.
/// Shared by the native sweep reserve, fee estimation and deployment gas.
pub const GAS_SAFETY_MULTIPLIER_PERCENT: u64 = 120;
const PERCENT_DENOMINATOR: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeSweepPlan {
    pub balance: U256,
    pub gas_units: u64,
    pub gas_price: U256,
    pub reserve: U256,
    pub sendable: U256,
    pub shortfall: U256,
}

impl NativeSweepPlan {
    pub fn can_sweep(&self) -> bool {
        self.balance > self.reserve
    }
}

pub fn apply_gas_safety_margin(value: U256) -> U256 {
    value.saturating_mul(U256::from(GAS_SAFETY_MULTIPLIER_PERCENT))
        / U256::from(PERCENT_DENOMINATOR)
}

pub fn native_sweep_reserve(gas_units: u64, gas_price: U256) -> U256 {
    apply_gas_safety_margin(U256::from(gas_units).saturating_mul(gas_price))
}

/// Gas limit for a contract deployment given the node's estimate.
pub fn deployment_gas_limit(estimated_gas_units: u64) -> u64 {
    let padded = u128::from(estimated_gas_units)
        .saturating_mul(u128::from(GAS_SAFETY_MULTIPLIER_PERCENT))
        / u128::from(PERCENT_DENOMINATOR);
    u64::try_from(padded).unwrap_or(u64::MAX)
}

pub fn plan_native_sweep(balance: U256, gas_units: u64, gas_price: U256) -> NativeSweepPlan {
    let reserve = native_sweep_reserve(gas_units, gas_price);
    NativeSweepPlan {
        balance,
        gas_units,
        gas_price,
        reserve,
        sendable: balance.saturating_sub(reserve),
        shortfall: reserve.saturating_sub(balance),
    }
}
