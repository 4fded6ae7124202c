use crate::config::NetworkProfile;
use crate::features::chain::{
    ChainClient, ChainClientFactory, FeeRate, GasQuote, ReceiptStatus, TxReceipt,
};
use crate::features::signer::SignerPort;
use alloy_primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::rc::Rc;
use std::sync::{Mutex, OnceLock};
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

/// Minimal single-threaded async executor for use in tests (no runtime required).
pub(crate) fn block_on_with_spin<F: Future>(future: F) -> F::Output {
    unsafe fn clone(_ptr: *const ()) -> RawWaker {
        dummy_raw_waker()
    }
    unsafe fn wake(_ptr: *const ()) {}
    unsafe fn wake_by_ref(_ptr: *const ()) {}
    unsafe fn drop(_ptr: *const ()) {}

    fn dummy_raw_waker() -> RawWaker {
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut context = Context::from_waker(&waker);
    let mut future = Box::pin(future);

    for _ in 0..10_000 {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::hint::spin_loop(),
        }
    }

    panic!("future did not complete in test polling loop");
}

/// Runs `f` with temporary host environment variable overrides under a global
/// process-wide lock to avoid cross-test races.
pub(crate) fn with_locked_host_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let previous = vars
        .iter()
        .map(|(name, _)| ((*name).to_string(), std::env::var(name).ok()))
        .collect::<Vec<_>>();

    for (name, value) in vars {
        set_or_remove_env(name, *value);
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (name, value) in previous {
        set_or_remove_env(&name, value.as_deref());
    }

    match result {
        Ok(output) => output,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

fn set_or_remove_env(name: &str, value: Option<&str>) {
    match value {
        Some(v) => {
            #[allow(unused_unsafe)]
            unsafe {
                std::env::set_var(name, v);
            }
        }
        None => {
            #[allow(unused_unsafe)]
            unsafe {
                std::env::remove_var(name);
            }
        }
    }
}

pub(crate) fn test_network(key: &str, chain_id: u64) -> NetworkProfile {
    NetworkProfile {
        key: key.to_string(),
        display_name: key.to_string(),
        chain_id,
        rpc_url: format!("http://{key}.invalid"),
        rpc_url_env: None,
        ..NetworkProfile::mantle()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SentTransfer {
    pub token: Option<Address>,
    pub to: Address,
    pub amount: U256,
    pub quote: Option<GasQuote>,
}

#[derive(Default)]
struct FakeChainState {
    native_balance: U256,
    token_balances: BTreeMap<Address, U256>,
    gas_units: u64,
    fee_rate: Option<FeeRate>,
    legacy_gas_price: U256,
    failures: BTreeMap<&'static str, String>,
    reverts: BTreeSet<&'static str>,
    pending: BTreeMap<String, (SentTransfer, bool)>,
    calls: Vec<&'static str>,
    sent: Vec<SentTransfer>,
    nonce: u64,
}

/// Scripted in-memory chain. Balances move only once a receipt is confirmed
/// as successful; every call is recorded by operation name.
pub(crate) struct FakeChain {
    key: String,
    state: RefCell<FakeChainState>,
}

impl FakeChain {
    pub fn new(key: &str) -> Rc<Self> {
        Rc::new(Self {
            key: key.to_string(),
            state: RefCell::new(FakeChainState {
                gas_units: 21_000,
                legacy_gas_price: U256::from(1_000_000_000u64),
                ..FakeChainState::default()
            }),
        })
    }

    pub fn set_native_balance(&self, balance: U256) {
        self.state.borrow_mut().native_balance = balance;
    }

    pub fn native_balance_now(&self) -> U256 {
        self.state.borrow().native_balance
    }

    pub fn set_token_balance(&self, token: Address, balance: U256) {
        self.state.borrow_mut().token_balances.insert(token, balance);
    }

    pub fn token_balance_now(&self, token: Address) -> U256 {
        self.state
            .borrow()
            .token_balances
            .get(&token)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_gas_units(&self, gas_units: u64) {
        self.state.borrow_mut().gas_units = gas_units;
    }

    pub fn set_fee_rate(&self, fee_rate: Option<FeeRate>) {
        self.state.borrow_mut().fee_rate = fee_rate;
    }

    pub fn set_legacy_gas_price(&self, price: U256) {
        self.state.borrow_mut().legacy_gas_price = price;
    }

    /// Makes every later call to `operation` fail with `message`.
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.state
            .borrow_mut()
            .failures
            .insert(operation, message.to_string());
    }

    /// Makes receipts of `"send_token"` or `"send_native"` transactions revert.
    pub fn revert(&self, operation: &'static str) {
        self.state.borrow_mut().reverts.insert(operation);
    }

    pub fn heal(&self) {
        let mut state = self.state.borrow_mut();
        state.failures.clear();
        state.reverts.clear();
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn sent(&self) -> Vec<SentTransfer> {
        self.state.borrow().sent.clone()
    }

    fn enter(&self, operation: &'static str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.calls.push(operation);
        match state.failures.get(operation) {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn submit(&self, operation: &'static str, transfer: SentTransfer) -> String {
        let mut state = self.state.borrow_mut();
        state.nonce += 1;
        let tx_hash = format!(
            "0x{}",
            hex::encode(keccak256(format!("{}:{}", self.key, state.nonce)))
        );
        let reverted = state.reverts.contains(operation);
        state.sent.push(transfer.clone());
        state.pending.insert(tx_hash.clone(), (transfer, reverted));
        tx_hash
    }
}

pub(crate) struct FakeClient {
    chain: Rc<FakeChain>,
    owner: Address,
}

#[async_trait(?Send)]
impl ChainClient for FakeClient {
    async fn native_balance(&self, _owner: Address) -> Result<U256, String> {
        self.chain.enter("native_balance")?;
        Ok(self.chain.native_balance_now())
    }

    async fn token_balance(&self, token: Address, _owner: Address) -> Result<U256, String> {
        self.chain.enter("token_balance")?;
        Ok(self.chain.token_balance_now(token))
    }

    async fn send_token(&self, token: Address, to: Address, amount: U256) -> Result<String, String> {
        self.chain.enter("send_token")?;
        Ok(self.chain.submit(
            "send_token",
            SentTransfer {
                token: Some(token),
                to,
                amount,
                quote: None,
            },
        ))
    }

    async fn send_native(
        &self,
        to: Address,
        value: U256,
        quote: &GasQuote,
    ) -> Result<String, String> {
        self.chain.enter("send_native")?;
        Ok(self.chain.submit(
            "send_native",
            SentTransfer {
                token: None,
                to,
                amount: value,
                quote: Some(*quote),
            },
        ))
    }

    async fn estimate_gas(&self, from: Address, _to: Address, value: U256) -> Result<u64, String> {
        self.chain.enter("estimate_gas")?;
        assert_eq!(from, self.owner, "gas must be estimated for the wallet");
        assert_eq!(value, U256::ZERO, "gas must be estimated for a zero-value send");
        Ok(self.chain.state.borrow().gas_units)
    }

    async fn estimate_fee_rate(&self) -> Result<Option<FeeRate>, String> {
        self.chain.enter("estimate_fee_rate")?;
        Ok(self.chain.state.borrow().fee_rate)
    }

    async fn legacy_gas_price(&self) -> Result<U256, String> {
        self.chain.enter("legacy_gas_price")?;
        Ok(self.chain.state.borrow().legacy_gas_price)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, String> {
        self.chain.enter("wait_for_receipt")?;
        let mut state = self.chain.state.borrow_mut();
        let (transfer, reverted) = state
            .pending
            .remove(tx_hash)
            .ok_or_else(|| format!("unknown transaction {tx_hash}"))?;
        if reverted {
            return Ok(TxReceipt {
                tx_hash: tx_hash.to_string(),
                status: ReceiptStatus::Reverted,
                block_number: Some(state.nonce),
            });
        }
        match transfer.token {
            Some(token) => {
                let balance = state.token_balances.entry(token).or_default();
                *balance = balance.saturating_sub(transfer.amount);
            }
            None => {
                let fee = transfer
                    .quote
                    .map(|quote| U256::from(quote.gas_limit).saturating_mul(quote.gas_price))
                    .unwrap_or_default();
                state.native_balance = state
                    .native_balance
                    .saturating_sub(transfer.amount)
                    .saturating_sub(fee);
            }
        }
        Ok(TxReceipt {
            tx_hash: tx_hash.to_string(),
            status: ReceiptStatus::Success,
            block_number: Some(state.nonce),
        })
    }
}

/// Hands out clients for the scripted chains and records connection order.
pub(crate) struct FakeChainFactory {
    chains: BTreeMap<String, Rc<FakeChain>>,
    connections: RefCell<Vec<String>>,
}

impl FakeChainFactory {
    pub fn new(chains: &[&Rc<FakeChain>]) -> Self {
        Self {
            chains: chains
                .iter()
                .map(|chain| (chain.key.clone(), Rc::clone(chain)))
                .collect(),
            connections: RefCell::new(Vec::new()),
        }
    }

    pub fn connections(&self) -> Vec<String> {
        self.connections.borrow().clone()
    }
}

impl ChainClientFactory for FakeChainFactory {
    fn connect<'a>(
        &'a self,
        network: &NetworkProfile,
        signer: &'a dyn SignerPort,
    ) -> Result<Box<dyn ChainClient + 'a>, String> {
        self.connections.borrow_mut().push(network.key.clone());
        let chain = self
            .chains
            .get(&network.key)
            .ok_or_else(|| format!("no fake chain for {}", network.key))?;
        Ok(Box::new(FakeClient {
            chain: Rc::clone(chain),
            owner: signer.address(),
        }))
    }
}
