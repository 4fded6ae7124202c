use alloy_primitives::U256;

/// Renders a base-unit integer as a decimal string with `decimals` fractional
/// digits, trailing zeros trimmed but always keeping at least one.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let scale = usize::from(decimals);
    if scale == 0 {
        return format!("{digits}.0");
    }

    let padded = if digits.len() <= scale {
        format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
    } else {
        digits
    };
    let (integer, fraction) = padded.split_at(padded.len() - scale);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{integer}.0")
    } else {
        format!("{integer}.{fraction}")
    }
}
