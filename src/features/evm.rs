use crate::config::NetworkProfile;
use crate::domain::address::to_hex;
use crate::domain::gas_reserve::apply_gas_safety_margin;
use crate::features::chain::{
    ChainClient, ChainClientFactory, FeeMode, FeeRate, GasQuote, ReceiptStatus, TxReceipt,
};
use crate::features::signer::SignerPort;
use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_rlp::{length_of_length, BufMut, Encodable, Header};
use async_trait::async_trait;
use canlog::{log, GetLogFilter, LogFilter, LogPriorityLevels};
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;

const MAX_EVM_RPC_RESPONSE_BYTES: u64 = 2 * 1024 * 1024;
const MIN_EVM_RPC_RESPONSE_BYTES: u64 = 256;
const EMPTY_ACCESS_LIST_RLP_LEN: usize = 1;
const ERC20_BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

#[derive(Clone, Copy, Debug, LogPriorityLevels)]
enum EvmRpcLogPriority {
    #[log_level(capacity = 1000, name = "EVM_RPC_INFO")]
    Info,
    #[log_level(capacity = 500, name = "EVM_RPC_WARN")]
    Warn,
}

impl GetLogFilter for EvmRpcLogPriority {
    fn get_log_filter() -> LogFilter {
        LogFilter::ShowAll
    }
}

/// Moves one JSON-RPC request body to an endpoint and returns the raw
/// response body, refusing bodies larger than `max_response_bytes`.
pub trait RpcTransport {
    fn post(&self, url: &str, body: &[u8], max_response_bytes: u64) -> Result<Vec<u8>, String>;
}

/// Blocking HTTP transport.
#[derive(Clone, Debug, Default)]
pub struct UreqTransport;

impl RpcTransport for UreqTransport {
    fn post(&self, url: &str, body: &[u8], max_response_bytes: u64) -> Result<Vec<u8>, String> {
        let response = ureq::post(url)
            .set("content-type", "application/json")
            .send_bytes(body)
            .map_err(|error| match error {
                ureq::Error::Status(status, _) => format!("evm rpc returned status {status}"),
                ureq::Error::Transport(transport) => {
                    format!("evm rpc transport failed: {transport}")
                }
            })?;

        let mut raw = Vec::new();
        response
            .into_reader()
            .take(max_response_bytes.saturating_add(1))
            .read_to_end(&mut raw)
            .map_err(|error| format!("failed to read rpc response body: {error}"))?;
        if u64::try_from(raw.len()).unwrap_or(u64::MAX) > max_response_bytes {
            return Err(format!(
                "rpc response exceeded max_response_bytes={max_response_bytes}"
            ));
        }
        Ok(raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcReceipt {
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct HttpEvmRpcClient<T = UreqTransport> {
    rpc_url: String,
    fallback_rpc_url: Option<String>,
    max_response_bytes: u64,
    transport: T,
}

impl HttpEvmRpcClient<UreqTransport> {
    pub fn from_profile(profile: &NetworkProfile) -> Result<Self, String> {
        Self::with_transport(profile, UreqTransport)
    }
}

impl<T: RpcTransport> HttpEvmRpcClient<T> {
    pub fn with_transport(profile: &NetworkProfile, transport: T) -> Result<Self, String> {
        let rpc_url = profile.rpc_url.trim();
        if rpc_url.is_empty() {
            return Err(format!("rpc url for network {} is not configured", profile.key));
        }
        let fallback_rpc_url = profile
            .fallback_rpc_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Ok(Self {
            rpc_url: rpc_url.to_string(),
            fallback_rpc_url,
            max_response_bytes: clamp_response_bytes(profile.max_response_bytes),
            transport,
        })
    }

    pub async fn eth_get_balance(&self, address: Address) -> Result<U256, String> {
        let response = self
            .rpc_call("eth_getBalance", json!([to_hex(&address), "latest"]))
            .await
            .map_err(|error| format!("eth_getBalance failed: {error}"))?;
        parse_hex_u256(result_str(&response, "eth_getBalance")?, "eth_getBalance")
    }

    pub async fn eth_call(&self, to: Address, calldata: &[u8]) -> Result<Vec<u8>, String> {
        let data = format!("0x{}", hex::encode(calldata));
        let response = self
            .rpc_call("eth_call", json!([{"to": to_hex(&to), "data": data}, "latest"]))
            .await
            .map_err(|error| format!("eth_call failed: {error}"))?;
        decode_hex_blob(result_str(&response, "eth_call")?, "eth_call result")
    }

    pub async fn eth_get_transaction_count(&self, address: Address) -> Result<u64, String> {
        let response = self
            .rpc_call(
                "eth_getTransactionCount",
                json!([to_hex(&address), "pending"]),
            )
            .await
            .map_err(|error| format!("eth_getTransactionCount failed: {error}"))?;
        parse_hex_u64(
            result_str(&response, "eth_getTransactionCount")?,
            "eth_getTransactionCount",
        )
    }

    pub async fn eth_gas_price(&self) -> Result<U256, String> {
        let response = self
            .rpc_call("eth_gasPrice", json!([]))
            .await
            .map_err(|error| format!("eth_gasPrice failed: {error}"))?;
        parse_hex_u256(result_str(&response, "eth_gasPrice")?, "eth_gasPrice")
    }

    pub async fn eth_max_priority_fee_per_gas(&self) -> Result<U256, String> {
        let response = self
            .rpc_call("eth_maxPriorityFeePerGas", json!([]))
            .await
            .map_err(|error| format!("eth_maxPriorityFeePerGas failed: {error}"))?;
        parse_hex_u256(
            result_str(&response, "eth_maxPriorityFeePerGas")?,
            "eth_maxPriorityFeePerGas",
        )
    }

    /// Base fee of the latest block, `None` on chains without EIP-1559.
    pub async fn latest_base_fee(&self) -> Result<Option<U256>, String> {
        let response = self
            .rpc_call("eth_getBlockByNumber", json!(["latest", false]))
            .await
            .map_err(|error| format!("eth_getBlockByNumber failed: {error}"))?;
        let block = response
            .get("result")
            .filter(|block| !block.is_null())
            .ok_or_else(|| "eth_getBlockByNumber result was missing".to_string())?;
        block
            .get("baseFeePerGas")
            .and_then(Value::as_str)
            .map(|raw| parse_hex_u256(raw, "baseFeePerGas"))
            .transpose()
    }

    pub async fn eth_estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Result<u64, String> {
        let response = self
            .rpc_call(
                "eth_estimateGas",
                json!([{
                    "from": to_hex(&from),
                    "to": to_hex(&to),
                    "value": format!("0x{value:x}"),
                    "data": format!("0x{}", hex::encode(data)),
                }]),
            )
            .await
            .map_err(|error| format!("eth_estimateGas failed: {error}"))?;
        parse_hex_u64(result_str(&response, "eth_estimateGas")?, "eth_estimateGas")
    }

    pub async fn eth_send_raw_transaction(&self, raw_tx: &[u8]) -> Result<String, String> {
        let payload = format!("0x{}", hex::encode(raw_tx));
        let response = self
            .rpc_call("eth_sendRawTransaction", json!([payload]))
            .await
            .map_err(|error| format!("eth_sendRawTransaction failed: {error}"))?;
        let raw = result_str(&response, "eth_sendRawTransaction")?;
        let bytes = decode_hex_blob(raw, "eth_sendRawTransaction result")?;
        if bytes.len() != 32 {
            return Err("eth_sendRawTransaction result must be a 32-byte hash".to_string());
        }
        Ok(format!("0x{}", hex::encode(bytes)))
    }

    /// `None` while the transaction is still pending.
    pub async fn eth_get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<RpcReceipt>, String> {
        let response = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
            .await
            .map_err(|error| format!("eth_getTransactionReceipt failed: {error}"))?;
        let Some(receipt) = response.get("result").filter(|receipt| !receipt.is_null()) else {
            return Ok(None);
        };
        let status = receipt
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| "transaction receipt status was missing".to_string())?;
        let status = match parse_hex_u64(status, "receipt status")? {
            1 => ReceiptStatus::Success,
            _ => ReceiptStatus::Reverted,
        };
        let block_number = receipt
            .get("blockNumber")
            .and_then(Value::as_str)
            .map(|raw| parse_hex_u64(raw, "receipt blockNumber"))
            .transpose()?;
        Ok(Some(RpcReceipt {
            status,
            block_number,
        }))
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, String> {
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .map_err(|error| format!("failed to serialize {method} request: {error}"))?;

        let raw = self.http_post(&body)?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|error| format!("failed to parse {method} response JSON: {error}"))?;
        if let Some(error) = value.get("error") {
            return Err(format!("rpc returned error for {method}: {error}"));
        }
        Ok(value)
    }

    fn http_post(&self, body: &[u8]) -> Result<Vec<u8>, String> {
        match self
            .transport
            .post(&self.rpc_url, body, self.max_response_bytes)
        {
            Ok(body) => Ok(body),
            Err(primary_error) => {
                let Some(fallback_url) = self.fallback_rpc_url.as_deref() else {
                    return Err(primary_error);
                };
                log!(
                    EvmRpcLogPriority::Warn,
                    "rpc={} failed error={} retrying on fallback",
                    self.rpc_url,
                    primary_error
                );
                self.transport
                    .post(fallback_url, body, self.max_response_bytes)
                    .map_err(|fallback_error| {
                        format!(
                            "primary rpc failed: {primary_error}; fallback rpc failed: {fallback_error}"
                        )
                    })
            }
        }
    }
}

fn clamp_response_bytes(max_response_bytes: u64) -> u64 {
    max_response_bytes.clamp(MIN_EVM_RPC_RESPONSE_BYTES, MAX_EVM_RPC_RESPONSE_BYTES)
}

fn result_str<'a>(response: &'a Value, method: &str) -> Result<&'a str, String> {
    response
        .get("result")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{method} result was missing"))
}

fn strip_hex_prefix<'a>(raw: &'a str, field: &str) -> Result<&'a str, String> {
    let value = raw.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| format!("{field} must be 0x-prefixed hex"))
}

fn parse_hex_u64(raw: &str, field: &str) -> Result<u64, String> {
    let without_prefix = strip_hex_prefix(raw, field)?;
    u64::from_str_radix(without_prefix, 16)
        .map_err(|error| format!("failed to parse {field} as hex u64: {error}"))
}

fn parse_hex_u256(raw: &str, field: &str) -> Result<U256, String> {
    let without_prefix = strip_hex_prefix(raw, field)?;
    if without_prefix.is_empty() {
        return Ok(U256::ZERO);
    }
    if without_prefix.len() > 64 {
        return Err(format!("{field} exceeds 32 bytes"));
    }
    U256::from_str_radix(without_prefix, 16)
        .map_err(|error| format!("failed to parse {field} as hex quantity: {error}"))
}

fn decode_hex_blob(raw: &str, field: &str) -> Result<Vec<u8>, String> {
    let without_prefix = strip_hex_prefix(raw, field)?;
    if without_prefix.len() % 2 != 0 {
        return Err(format!("{field} hex length must be even"));
    }
    hex::decode(without_prefix).map_err(|error| format!("{field} must be valid hex: {error}"))
}

fn abi_word_address(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// ERC-20 `balanceOf(address)` calldata.
pub fn encode_balance_of(owner: Address) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(36);
    calldata.extend_from_slice(&ERC20_BALANCE_OF_SELECTOR);
    calldata.extend_from_slice(&abi_word_address(owner));
    calldata
}

/// ERC-20 `transfer(address,uint256)` calldata.
pub fn encode_transfer(to: Address, amount: U256) -> Vec<u8> {
    let mut calldata = Vec::with_capacity(68);
    calldata.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    calldata.extend_from_slice(&abi_word_address(to));
    calldata.extend_from_slice(&amount.to_be_bytes::<32>());
    calldata
}

fn decode_uint256_word(raw: &[u8], field: &str) -> Result<U256, String> {
    if raw.len() < 32 {
        return Err(format!(
            "{field} returned {} bytes, expected a 32-byte word",
            raw.len()
        ));
    }
    Ok(U256::from_be_slice(&raw[..32]))
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Eip1559UnsignedTx {
    chain_id: U256,
    nonce: U256,
    max_priority_fee_per_gas: U256,
    max_fee_per_gas: U256,
    gas_limit: U256,
    to: Address,
    value: U256,
    data: Bytes,
}

impl Eip1559UnsignedTx {
    fn payload_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
            + EMPTY_ACCESS_LIST_RLP_LEN
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
    }
}

impl Encodable for Eip1559UnsignedTx {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.encode_fields(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length)
    }
}

struct Eip1559SignedTx<'a> {
    tx: &'a Eip1559UnsignedTx,
    y_parity: u8,
    r: U256,
    s: U256,
}

impl Eip1559SignedTx<'_> {
    fn payload_length(&self) -> usize {
        self.tx.payload_length() + self.y_parity.length() + self.r.length() + self.s.length()
    }
}

impl Encodable for Eip1559SignedTx<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.tx.encode_fields(out);
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length)
    }
}

fn typed_envelope(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(0x02);
    out.extend_from_slice(&payload);
    out
}

fn encode_eip1559_unsigned(tx: &Eip1559UnsignedTx) -> Vec<u8> {
    typed_envelope(alloy_rlp::encode(tx))
}

fn encode_eip1559_signed(tx: &Eip1559UnsignedTx, y_parity: u8, r: U256, s: U256) -> Vec<u8> {
    typed_envelope(alloy_rlp::encode(Eip1559SignedTx { tx, y_parity, r, s }))
}

/// Untyped transaction for chains without a base fee. Signed per EIP-155, so
/// the chain id is bound through the signing payload and `v`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LegacyUnsignedTx {
    chain_id: u64,
    nonce: U256,
    gas_price: U256,
    gas_limit: U256,
    to: Address,
    value: U256,
    data: Bytes,
}

impl LegacyUnsignedTx {
    fn fields_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
    }

    /// `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`
    fn signing_payload(&self) -> Vec<u8> {
        let chain_id = U256::from(self.chain_id);
        let payload_length = self.fields_length() + chain_id.length() + 2 * 0u8.length();
        let mut out = Vec::with_capacity(payload_length + length_of_length(payload_length));
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        chain_id.encode(&mut out);
        0u8.encode(&mut out);
        0u8.encode(&mut out);
        out
    }

    fn encode_signed(&self, y_parity: u8, r: U256, s: U256) -> Vec<u8> {
        // v = chainId * 2 + 35 + yParity
        let v = U256::from(self.chain_id)
            .saturating_mul(U256::from(2u8))
            .saturating_add(U256::from(35u8 + y_parity));
        let payload_length = self.fields_length() + v.length() + r.length() + s.length();
        let mut out = Vec::with_capacity(payload_length + length_of_length(payload_length));
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_fields(&mut out);
        v.encode(&mut out);
        r.encode(&mut out);
        s.encode(&mut out);
        out
    }
}

/// Fields shared by both envelopes.
struct TxRequest {
    nonce: u64,
    gas_limit: U256,
    to: Address,
    value: U256,
    data: Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TxPricing {
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
    Legacy {
        gas_price: U256,
    },
}

impl TxPricing {
    fn from_quote(quote: &GasQuote) -> Self {
        match quote.mode {
            FeeMode::Eip1559 => TxPricing::Eip1559 {
                max_fee_per_gas: quote.gas_price,
                max_priority_fee_per_gas: quote.priority_fee,
            },
            FeeMode::Legacy => TxPricing::Legacy {
                gas_price: quote.gas_price,
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TxPricing::Eip1559 { .. } => "eip1559",
            TxPricing::Legacy { .. } => "legacy",
        }
    }
}

/// `ChainClient` over JSON-RPC, signing locally with the agent wallet key.
///
/// Receipt polling pauses between attempts with a blocking sleep
/// (`std::thread::sleep` unless replaced through [`Self::with_sleep`]), so
/// `wait_for_receipt` holds its executor thread while a transaction is
/// pending.
pub struct HttpEvmChainClient<'a, T = UreqTransport> {
    network: NetworkProfile,
    rpc: HttpEvmRpcClient<T>,
    signer: &'a dyn SignerPort,
    sleep: fn(Duration),
}

impl<'a, T: RpcTransport> HttpEvmChainClient<'a, T> {
    pub fn new(
        network: &NetworkProfile,
        transport: T,
        signer: &'a dyn SignerPort,
    ) -> Result<Self, String> {
        Ok(Self {
            network: network.clone(),
            rpc: HttpEvmRpcClient::with_transport(network, transport)?,
            signer,
            sleep: std::thread::sleep,
        })
    }

    /// Replaces the pause used between receipt polls.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn rpc(&self) -> &HttpEvmRpcClient<T> {
        &self.rpc
    }

    /// EIP-1559 pricing when the chain reports a base fee, else a legacy
    /// gas price.
    async fn current_pricing(&self) -> Result<TxPricing, String> {
        if let Some(rate) = self.estimate_fee_rate().await? {
            return Ok(TxPricing::Eip1559 {
                max_fee_per_gas: rate.max_fee_per_gas,
                max_priority_fee_per_gas: rate.max_priority_fee_per_gas,
            });
        }
        Ok(TxPricing::Legacy {
            gas_price: self.rpc.eth_gas_price().await?,
        })
    }

    async fn sign_and_send(&self, request: TxRequest, pricing: TxPricing) -> Result<String, String> {
        let raw = match pricing {
            TxPricing::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let tx = Eip1559UnsignedTx {
                    chain_id: U256::from(self.network.chain_id),
                    nonce: U256::from(request.nonce),
                    max_priority_fee_per_gas: max_priority_fee_per_gas.min(max_fee_per_gas),
                    max_fee_per_gas,
                    gas_limit: request.gas_limit,
                    to: request.to,
                    value: request.value,
                    data: request.data,
                };
                let signing_hash = keccak256(encode_eip1559_unsigned(&tx));
                let signature = self.signer.sign_hash(&signing_hash).await?;
                encode_eip1559_signed(&tx, signature.y_parity, signature.r, signature.s)
            }
            TxPricing::Legacy { gas_price } => {
                let tx = LegacyUnsignedTx {
                    chain_id: self.network.chain_id,
                    nonce: U256::from(request.nonce),
                    gas_price,
                    gas_limit: request.gas_limit,
                    to: request.to,
                    value: request.value,
                    data: request.data,
                };
                let signing_hash = keccak256(tx.signing_payload());
                let signature = self.signer.sign_hash(&signing_hash).await?;
                tx.encode_signed(signature.y_parity, signature.r, signature.s)
            }
        };
        let tx_hash = self.rpc.eth_send_raw_transaction(&raw).await?;
        log!(
            EvmRpcLogPriority::Info,
            "network={} nonce={} to={} envelope={} tx={} broadcast",
            self.network.key,
            request.nonce,
            to_hex(&request.to),
            pricing.label(),
            tx_hash
        );
        Ok(tx_hash)
    }
}

#[async_trait(?Send)]
impl<T: RpcTransport> ChainClient for HttpEvmChainClient<'_, T> {
    async fn native_balance(&self, owner: Address) -> Result<U256, String> {
        self.rpc.eth_get_balance(owner).await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, String> {
        let raw = self.rpc.eth_call(token, &encode_balance_of(owner)).await?;
        decode_uint256_word(&raw, "balanceOf")
    }

    async fn send_token(&self, token: Address, to: Address, amount: U256) -> Result<String, String> {
        let from = self.signer.address();
        let calldata = encode_transfer(to, amount);
        let nonce = self.rpc.eth_get_transaction_count(from).await?;
        let estimated = self
            .rpc
            .eth_estimate_gas(from, token, U256::ZERO, &calldata)
            .await?;
        let pricing = self.current_pricing().await?;
        self.sign_and_send(
            TxRequest {
                nonce,
                gas_limit: apply_gas_safety_margin(U256::from(estimated)),
                to: token,
                value: U256::ZERO,
                data: Bytes::from(calldata),
            },
            pricing,
        )
        .await
    }

    async fn send_native(
        &self,
        to: Address,
        value: U256,
        quote: &GasQuote,
    ) -> Result<String, String> {
        let nonce = self
            .rpc
            .eth_get_transaction_count(self.signer.address())
            .await?;
        self.sign_and_send(
            TxRequest {
                nonce,
                gas_limit: U256::from(quote.gas_limit),
                to,
                value,
                data: Bytes::new(),
            },
            TxPricing::from_quote(quote),
        )
        .await
    }

    async fn estimate_gas(&self, from: Address, to: Address, value: U256) -> Result<u64, String> {
        self.rpc.eth_estimate_gas(from, to, value, &[]).await
    }

    async fn estimate_fee_rate(&self) -> Result<Option<FeeRate>, String> {
        let Some(base_fee) = self.rpc.latest_base_fee().await? else {
            return Ok(None);
        };
        let priority = match self.rpc.eth_max_priority_fee_per_gas().await {
            Ok(priority) => priority,
            Err(error) => {
                // tip = gasPrice - baseFee when the node has no tip oracle
                let gas_price = self.rpc.eth_gas_price().await?;
                let priority = gas_price.saturating_sub(base_fee);
                log!(
                    EvmRpcLogPriority::Warn,
                    "network={} priority fee unavailable error={} derived={}",
                    self.network.key,
                    error,
                    priority
                );
                priority
            }
        };
        Ok(Some(FeeRate {
            max_fee_per_gas: apply_gas_safety_margin(base_fee).saturating_add(priority),
            max_priority_fee_per_gas: priority,
        }))
    }

    async fn legacy_gas_price(&self) -> Result<U256, String> {
        self.rpc.eth_gas_price().await
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, String> {
        let interval = Duration::from_millis(self.network.receipt_poll_interval_ms);
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            if let Some(receipt) = self.rpc.eth_get_transaction_receipt(tx_hash).await? {
                log!(
                    EvmRpcLogPriority::Info,
                    "network={} tx={} status={} attempts={}",
                    self.network.key,
                    tx_hash,
                    receipt.status.as_str(),
                    attempts
                );
                return Ok(TxReceipt {
                    tx_hash: tx_hash.to_string(),
                    status: receipt.status,
                    block_number: receipt.block_number,
                });
            }
            if let Some(max_attempts) = self.network.receipt_poll_max_attempts {
                if attempts >= max_attempts {
                    return Err(format!(
                        "receipt for {tx_hash} not available after {attempts} attempts"
                    ));
                }
            }
            if !interval.is_zero() {
                (self.sleep)(interval);
            }
        }
    }
}

/// Connects JSON-RPC clients for each network over a shared transport.
#[derive(Clone, Debug, Default)]
pub struct HttpChainClientFactory<T = UreqTransport> {
    transport: T,
}

impl<T: RpcTransport + Clone> HttpChainClientFactory<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: RpcTransport + Clone + 'static> ChainClientFactory for HttpChainClientFactory<T> {
    fn connect<'a>(
        &'a self,
        network: &NetworkProfile,
        signer: &'a dyn SignerPort,
    ) -> Result<Box<dyn ChainClient + 'a>, String> {
        let client = HttpEvmChainClient::new(network, self.transport.clone(), signer)?;
        Ok(Box::new(client))
    }
}
