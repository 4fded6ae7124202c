use crate::domain::token_config::RawTokenConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const MANTLE_RPC_URL_ENV: &str = "ETHEREUM_PROVIDER_MANTLE";
pub const MANTLE_SEPOLIA_RPC_URL_ENV: &str = "ETHEREUM_PROVIDER_MANTLE_SEPOLIA_TESTNET";

const DEFAULT_NATIVE_SYMBOL: &str = "MNT";
const DEFAULT_NATIVE_DECIMALS: u8 = 18;
const DEFAULT_MAX_RESPONSE_BYTES: u64 = 256 * 1024;
const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 1_000;

fn default_native_symbol() -> String {
    DEFAULT_NATIVE_SYMBOL.to_string()
}

fn default_native_decimals() -> u8 {
    DEFAULT_NATIVE_DECIMALS
}

fn default_max_response_bytes() -> u64 {
    DEFAULT_MAX_RESPONSE_BYTES
}

fn default_receipt_poll_interval_ms() -> u64 {
    DEFAULT_RECEIPT_POLL_INTERVAL_MS
}

/// One settlement network. The position in [`SweepConfig::networks`] is the
/// settlement order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    pub key: String,
    #[serde(default)]
    pub display_name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default)]
    pub fallback_rpc_url: Option<String>,
    /// Environment variable that, when set to a non-blank value, replaces `rpc_url`.
    #[serde(default)]
    pub rpc_url_env: Option<String>,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Unbounded when `None`; callers impose their own deadline.
    #[serde(default)]
    pub receipt_poll_max_attempts: Option<u32>,
}

impl NetworkProfile {
    pub fn mantle() -> Self {
        Self {
            key: "mantle".to_string(),
            display_name: "Mantle Mainnet".to_string(),
            chain_id: 5_000,
            rpc_url: "https://rpc.mantle.xyz".to_string(),
            fallback_rpc_url: None,
            rpc_url_env: Some(MANTLE_RPC_URL_ENV.to_string()),
            native_symbol: default_native_symbol(),
            native_decimals: DEFAULT_NATIVE_DECIMALS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            receipt_poll_interval_ms: DEFAULT_RECEIPT_POLL_INTERVAL_MS,
            receipt_poll_max_attempts: None,
        }
    }

    pub fn mantle_sepolia() -> Self {
        Self {
            key: "mantleSepolia".to_string(),
            display_name: "Mantle Sepolia Testnet".to_string(),
            chain_id: 5_003,
            rpc_url: "https://rpc.sepolia.mantle.xyz".to_string(),
            rpc_url_env: Some(MANTLE_SEPOLIA_RPC_URL_ENV.to_string()),
            ..Self::mantle()
        }
    }

    fn apply_env_override(&mut self) {
        let Some(name) = self.rpc_url_env.as_deref() else {
            return;
        };
        if let Ok(value) = std::env::var(name) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.rpc_url = trimmed.to_string();
            }
        }
    }
}

pub fn default_network_profiles() -> Vec<NetworkProfile> {
    vec![NetworkProfile::mantle(), NetworkProfile::mantle_sepolia()]
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SweepConfig {
    #[serde(default = "default_network_profiles")]
    pub networks: Vec<NetworkProfile>,
    #[serde(default)]
    pub tokens: RawTokenConfig,
}

impl SweepConfig {
    pub fn new(networks: Vec<NetworkProfile>, tokens: RawTokenConfig) -> Self {
        Self { networks, tokens }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| format!("invalid sweep config json: {error}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("failed to read {}: {error}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Default networks with RPC overrides from the environment and the token
    /// declaration read from `token_config_path`.
    pub fn from_env(token_config_path: impl AsRef<Path>) -> Result<Self, String> {
        let path = token_config_path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("failed to read {}: {error}", path.display()))?;
        let tokens = RawTokenConfig::from_json_str(&raw)?;
        let config = Self::new(default_network_profiles(), tokens).with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        for network in &mut self.networks {
            network.apply_env_override();
        }
        self
    }

    pub fn network_keys(&self) -> Vec<&str> {
        self.networks
            .iter()
            .map(|network| network.key.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = BTreeSet::new();
        for network in &self.networks {
            let key = network.key.trim();
            if key.is_empty() {
                return Err("network key cannot be empty".to_string());
            }
            if !seen.insert(key) {
                return Err(format!("duplicate network key: {key}"));
            }
            if network.rpc_url.trim().is_empty() {
                return Err(format!("rpc url for network {key} is not configured"));
            }
        }
        Ok(())
    }
}
