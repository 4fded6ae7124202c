use crate::config::NetworkProfile;
use crate::features::signer::SignerPort;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

/// Transaction envelope a transfer is signed as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeeMode {
    /// Type-2 transaction with `maxFeePerGas` / `maxPriorityFeePerGas`.
    Eip1559,
    /// EIP-155 legacy transaction with a single `gasPrice`, for chains that
    /// expose no base fee.
    Legacy,
}

/// Fee parameters a transfer is priced with. `gas_price` is the most the
/// sender pays per gas unit (`maxFeePerGas` for EIP-1559 chains).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasQuote {
    pub gas_limit: u64,
    pub gas_price: U256,
    pub priority_fee: U256,
    pub mode: FeeMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeRate {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Success => "success",
            ReceiptStatus::Reverted => "reverted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
}

/// Chain operations needed to drain one wallet on one network. Every call is
/// a suspension point against a remote node; implementations never retry.
#[async_trait(?Send)]
pub trait ChainClient {
    async fn native_balance(&self, owner: Address) -> Result<U256, String>;

    /// ERC-20 `balanceOf(owner)`.
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, String>;

    /// ERC-20 `transfer(to, amount)` signed by the wallet; returns the tx hash.
    async fn send_token(&self, token: Address, to: Address, amount: U256) -> Result<String, String>;

    /// Plain value transfer priced exactly with `quote` and signed in the
    /// envelope its `mode` names; returns the tx hash.
    async fn send_native(&self, to: Address, value: U256, quote: &GasQuote)
        -> Result<String, String>;

    async fn estimate_gas(&self, from: Address, to: Address, value: U256) -> Result<u64, String>;

    /// Priority-fee-aware estimate, or `None` when the chain does not expose
    /// EIP-1559 fee data and transfers must be sent as legacy transactions.
    async fn estimate_fee_rate(&self) -> Result<Option<FeeRate>, String>;

    async fn legacy_gas_price(&self) -> Result<U256, String>;

    /// Resolves once the transaction is mined. Implementations may block the
    /// calling thread between polls.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, String>;
}

/// Builds the per-network client used for one sweep attempt.
pub trait ChainClientFactory {
    fn connect<'a>(
        &'a self,
        network: &NetworkProfile,
        signer: &'a dyn SignerPort,
    ) -> Result<Box<dyn ChainClient + 'a>, String>;
}
