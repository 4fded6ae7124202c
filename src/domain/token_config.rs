use crate::domain::address::parse_nonzero_address;
use crate::domain::types::{
    ConfigErrorReason, TokenConfigError, TokenDescriptor, ValidatedTokenConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Static declaration of the tokens to sweep, kept as loose JSON so that
/// wrongly shaped entries surface as a validation reason rather than a parse
/// error:
///
/// `{ "requiredSymbols": [..], "networks": { "<key>": { "tokens": [{ "symbol", "address", "decimals" }] } } }`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenConfig {
    #[serde(default)]
    pub required_symbols: Value,
    #[serde(default)]
    pub networks: Value,
}

impl RawTokenConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|error| format!("invalid token config json: {error}"))
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Resolves one descriptor per required symbol for each of `networks`, in
/// order. The first failing check wins.
pub fn validate_token_config(
    raw: &RawTokenConfig,
    networks: &[&str],
) -> Result<ValidatedTokenConfig, TokenConfigError> {
    let required_symbols: Vec<String> = raw
        .required_symbols
        .as_array()
        .map(|symbols| {
            symbols
                .iter()
                .filter_map(Value::as_str)
                .map(normalize_symbol)
                .collect()
        })
        .unwrap_or_default();
    if required_symbols.is_empty() {
        return Err(TokenConfigError {
            error: "Transfer token configuration is missing requiredSymbols.".to_string(),
            network: None,
            symbol: None,
            reason: ConfigErrorReason::RequiredSymbolsMissing,
        });
    }

    let mut tokens_by_network = BTreeMap::new();
    for network in networks {
        let entries = raw
            .networks
            .get(*network)
            .and_then(|config| config.get("tokens"))
            .and_then(Value::as_array)
            .ok_or_else(|| TokenConfigError {
                error: format!("Transfer token configuration missing network \"{network}\"."),
                network: Some((*network).to_string()),
                symbol: None,
                reason: ConfigErrorReason::NetworkTokensMissing,
            })?;

        let mut by_symbol: BTreeMap<String, &Value> = BTreeMap::new();
        for entry in entries {
            let Some(symbol) = entry.get("symbol").and_then(Value::as_str) else {
                continue;
            };
            let symbol = normalize_symbol(symbol);
            if symbol.is_empty() {
                continue;
            }
            by_symbol.insert(symbol, entry);
        }

        let mut resolved = Vec::with_capacity(required_symbols.len());
        for symbol in &required_symbols {
            resolved.push(resolve_token(network, symbol, by_symbol.get(symbol).copied())?);
        }
        tokens_by_network.insert((*network).to_string(), resolved);
    }

    Ok(ValidatedTokenConfig {
        required_symbols,
        tokens_by_network,
    })
}

fn resolve_token(
    network: &str,
    symbol: &str,
    entry: Option<&Value>,
) -> Result<TokenDescriptor, TokenConfigError> {
    let failure = |reason: ConfigErrorReason, error: String| TokenConfigError {
        error,
        network: Some(network.to_string()),
        symbol: Some(symbol.to_string()),
        reason,
    };

    let entry = entry.ok_or_else(|| {
        failure(
            ConfigErrorReason::TokenEntryMissing,
            format!("Token \"{symbol}\" is not configured for {network}."),
        )
    })?;

    let address = entry
        .get("address")
        .and_then(Value::as_str)
        .and_then(|raw| parse_nonzero_address(raw).ok())
        .ok_or_else(|| {
            failure(
                ConfigErrorReason::TokenAddressInvalid,
                format!("Token \"{symbol}\" has an invalid address for {network}."),
            )
        })?;

    let decimals = entry.get("decimals").and_then(parse_decimals).ok_or_else(|| {
        failure(
            ConfigErrorReason::TokenDecimalsInvalid,
            format!("Token \"{symbol}\" has invalid decimals for {network}."),
        )
    })?;

    Ok(TokenDescriptor {
        symbol: symbol.to_string(),
        address,
        decimals,
    })
}

// JSON numbers like `6.0` count as integers.
fn parse_decimals(value: &Value) -> Option<u8> {
    if let Some(integer) = value.as_u64() {
        return u8::try_from(integer).ok();
    }
    let float = value.as_f64()?;
    if float.fract() != 0.0 || !(0.0..=255.0).contains(&float) {
        return None;
    }
    u8::try_from(float as u64).ok()
}
