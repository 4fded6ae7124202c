use alloy_primitives::Address;
use std::str::FromStr;

/// Parses a 0x-prefixed 20-byte hex address. Single-case input is accepted
/// as-is; mixed-case input must carry a valid EIP-55 checksum. The prefix is
/// a lowercase `0x` and surrounding whitespace is not stripped.
pub fn parse_evm_address(raw: &str) -> Result<Address, String> {
    let hex_part = raw
        .strip_prefix("0x")
        .ok_or_else(|| "address must be 0x-prefixed".to_string())?;
    if hex_part.len() != 40 || !hex_part.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err("address must be a 0x-prefixed 20-byte hex string".to_string());
    }

    let has_lower = hex_part.bytes().any(|byte| byte.is_ascii_lowercase());
    let has_upper = hex_part.bytes().any(|byte| byte.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(format!("0x{hex_part}"), None)
            .map_err(|error| format!("address checksum is invalid: {error}"));
    }

    Address::from_str(hex_part).map_err(|error| format!("failed to parse address: {error}"))
}

/// Like [`parse_evm_address`] but also rejects the all-zero address.
pub fn parse_nonzero_address(raw: &str) -> Result<Address, String> {
    let address = parse_evm_address(raw)?;
    if address == Address::ZERO {
        return Err("address must not be the zero address".to_string());
    }
    Ok(address)
}

pub fn to_hex(address: &Address) -> String {
    format!("{address:#x}")
}
