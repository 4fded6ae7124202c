use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// Token descriptors resolved per network, one per required symbol, in the
/// order of `required_symbols`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedTokenConfig {
    pub required_symbols: Vec<String>,
    pub tokens_by_network: BTreeMap<String, Vec<TokenDescriptor>>,
}

impl ValidatedTokenConfig {
    pub fn tokens_for(&self, network: &str) -> &[TokenDescriptor] {
        self.tokens_by_network
            .get(network)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Everything a single sweep attempt needs after preflight. Built fresh per
/// attempt and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepContext {
    destination: Address,
    tokens: ValidatedTokenConfig,
}

impl SweepContext {
    pub(crate) fn new(destination: Address, tokens: ValidatedTokenConfig) -> Self {
        Self {
            destination,
            tokens,
        }
    }

    pub fn destination(&self) -> Address {
        self.destination
    }

    pub fn tokens(&self) -> &ValidatedTokenConfig {
        &self.tokens
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Native,
    Token,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Native => "NATIVE",
            AssetType::Token => "TOKEN",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub network: String,
    pub asset_type: AssetType,
    pub symbol: String,
    pub amount: String,
    pub tx_hash: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SweepSummary {
    pub from: Address,
    pub destination: Address,
    pub transfers: Vec<TransferRecord>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    MissingCreatorAddress,
    InvalidCreatorAddress,
    TokenConfigMissing,
    InsufficientSweepGas,
    AssetTransferFailed,
    SweepInProgress,
}

impl FailureCode {
    pub fn status(&self) -> u16 {
        match self {
            FailureCode::MissingCreatorAddress | FailureCode::InvalidCreatorAddress => 400,
            FailureCode::TokenConfigMissing
            | FailureCode::InsufficientSweepGas
            | FailureCode::AssetTransferFailed
            | FailureCode::SweepInProgress => 409,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::MissingCreatorAddress => "MISSING_CREATOR_ADDRESS",
            FailureCode::InvalidCreatorAddress => "INVALID_CREATOR_ADDRESS",
            FailureCode::TokenConfigMissing => "TOKEN_CONFIG_MISSING",
            FailureCode::InsufficientSweepGas => "INSUFFICIENT_SWEEP_GAS",
            FailureCode::AssetTransferFailed => "ASSET_TRANSFER_FAILED",
            FailureCode::SweepInProgress => "SWEEP_IN_PROGRESS",
        }
    }
}

/// Terminal outcome of a denied or aborted sweep. Transfers confirmed before
/// the failing step are not reported here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SweepFailure {
    pub status: u16,
    pub code: FailureCode,
    pub error: String,
    pub details: Value,
}

impl SweepFailure {
    pub fn new(code: FailureCode, error: impl Into<String>, details: Value) -> Self {
        Self {
            status: code.status(),
            code,
            error: error.into(),
            details,
        }
    }

    /// Body forwarded verbatim to the caller of the deletion endpoint.
    pub fn payload(&self) -> Value {
        json!({
            "error": self.error,
            "code": self.code,
            "details": self.details,
        })
    }

    pub fn http_status(&self) -> u16 {
        self.status
    }

    pub fn stage(&self) -> Option<&str> {
        self.details.get("stage").and_then(Value::as_str)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigErrorReason {
    RequiredSymbolsMissing,
    NetworkTokensMissing,
    TokenEntryMissing,
    TokenAddressInvalid,
    TokenDecimalsInvalid,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenConfigError {
    pub error: String,
    pub network: Option<String>,
    pub symbol: Option<String>,
    pub reason: ConfigErrorReason,
}

impl TokenConfigError {
    pub fn code(&self) -> FailureCode {
        FailureCode::TokenConfigMissing
    }

    pub fn details(&self) -> Value {
        let mut details = Map::new();
        if let Some(network) = &self.network {
            details.insert("network".to_string(), Value::String(network.clone()));
        }
        if let Some(symbol) = &self.symbol {
            details.insert("symbol".to_string(), Value::String(symbol.clone()));
        }
        details.insert("reason".to_string(), json!(self.reason));
        Value::Object(details)
    }

    pub fn into_failure(self) -> SweepFailure {
        let details = self.details();
        SweepFailure::new(self.code(), self.error, details)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStage {
    BalanceCheck,
    TransferSubmit,
    TransferReceipt,
    NativeBalance,
    NativeGasPrice,
    NativeGasEstimate,
    NativeTransferSubmit,
    NativeTransferReceipt,
    SignerSetup,
    ClientSetup,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::BalanceCheck => "BALANCE_CHECK",
            TransferStage::TransferSubmit => "TRANSFER_SUBMIT",
            TransferStage::TransferReceipt => "TRANSFER_RECEIPT",
            TransferStage::NativeBalance => "NATIVE_BALANCE",
            TransferStage::NativeGasPrice => "NATIVE_GAS_PRICE",
            TransferStage::NativeGasEstimate => "NATIVE_GAS_ESTIMATE",
            TransferStage::NativeTransferSubmit => "NATIVE_TRANSFER_SUBMIT",
            TransferStage::NativeTransferReceipt => "NATIVE_TRANSFER_RECEIPT",
            TransferStage::SignerSetup => "SIGNER_SETUP",
            TransferStage::ClientSetup => "CLIENT_SETUP",
        }
    }
}

/// The slice of a persisted agent row this engine reads.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub encrypted_private_key: String,
    #[serde(default)]
    pub creator_address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum SettlingAsset {
    Token { symbol: String },
    Native,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Preflight,
    Denied { code: FailureCode },
    ContextReady,
    Settling { network: String, asset: SettlingAsset },
    Failed { code: FailureCode },
    Settled,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum SweepEvent {
    Begin,
    PreflightPassed,
    PreflightDenied { code: FailureCode },
    SettleToken { network: String, symbol: String },
    SettleNative { network: String },
    StepFailed { code: FailureCode },
    Completed,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TransitionError {
    pub from: SweepState,
    pub event: String,
    pub reason: String,
}
