use crate::config::{NetworkProfile, SweepConfig};
use crate::domain::address::{parse_evm_address, to_hex};
use crate::domain::gas_reserve::plan_native_sweep;
use crate::domain::preflight::preflight_sweep;
use crate::domain::state_machine::transition;
use crate::domain::types::{
    AgentRecord, AssetType, FailureCode, SweepContext, SweepEvent, SweepFailure, SweepState,
    SweepSummary, TokenDescriptor, TransferRecord, TransferStage,
};
use crate::domain::units::format_units;
use crate::features::chain::{ChainClient, ChainClientFactory, FeeMode, GasQuote, ReceiptStatus};
use crate::features::signer::{KeyResolver, LocalKeySigner, SignerPort};
use alloy_primitives::{Address, U256};
use canlog::{log, GetLogFilter, LogFilter, LogPriorityLevels};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, LogPriorityLevels)]
enum SweepLogPriority {
    #[log_level(capacity = 1000, name = "SWEEP_INFO")]
    Info,
    #[log_level(capacity = 500, name = "SWEEP_ERROR")]
    Error,
}

impl GetLogFilter for SweepLogPriority {
    fn get_log_filter() -> LogFilter {
        LogFilter::ShowAll
    }
}

// ── Attempt bookkeeping ─────────────────────────────────────────────────────

struct SweepAttempt {
    label: String,
    state: SweepState,
}

impl SweepAttempt {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: SweepState::Idle,
        }
    }

    fn advance(&mut self, event: SweepEvent) -> Result<(), SweepFailure> {
        let next = transition(&self.state, &event).map_err(|error| {
            SweepFailure::new(
                FailureCode::AssetTransferFailed,
                "Sweep attempt entered an invalid state.",
                json!({
                    "from": format!("{:?}", error.from),
                    "event": error.event,
                    "message": error.reason,
                }),
            )
        })?;
        log!(
            SweepLogPriority::Info,
            "sweep={} state={:?}",
            self.label,
            next
        );
        self.state = next;
        Ok(())
    }

    fn deny(&mut self, failure: SweepFailure) -> SweepFailure {
        log!(
            SweepLogPriority::Error,
            "sweep={} denied code={} error={}",
            self.label,
            failure.code.as_str(),
            failure.error
        );
        if let Ok(next) = transition(
            &self.state,
            &SweepEvent::PreflightDenied { code: failure.code },
        ) {
            self.state = next;
        }
        failure
    }

    fn fail(&mut self, failure: SweepFailure) -> SweepFailure {
        log!(
            SweepLogPriority::Error,
            "sweep={} aborted code={} stage={} error={}",
            self.label,
            failure.code.as_str(),
            failure.stage().unwrap_or("-"),
            failure.error
        );
        if let Ok(next) = transition(&self.state, &SweepEvent::StepFailed { code: failure.code }) {
            self.state = next;
        }
        failure
    }
}

// ── Per-network executor ────────────────────────────────────────────────────

struct NetworkSettlement<'a> {
    network: &'a NetworkProfile,
    client: &'a dyn ChainClient,
    owner: Address,
    destination: Address,
}

impl NetworkSettlement<'_> {
    fn step_failure(
        &self,
        symbol: &str,
        stage: TransferStage,
        error: String,
        tx_hash: Option<&str>,
        message: String,
    ) -> SweepFailure {
        let mut details = json!({
            "network": self.network.key,
            "symbol": symbol,
            "stage": stage.as_str(),
        });
        if let Some(tx_hash) = tx_hash {
            details["txHash"] = Value::String(tx_hash.to_string());
        }
        details["message"] = Value::String(message);
        SweepFailure::new(FailureCode::AssetTransferFailed, error, details)
    }

    fn reverted(
        &self,
        symbol: &str,
        stage: TransferStage,
        error: String,
        tx_hash: &str,
        status: ReceiptStatus,
    ) -> SweepFailure {
        SweepFailure::new(
            FailureCode::AssetTransferFailed,
            error,
            json!({
                "network": self.network.key,
                "symbol": symbol,
                "stage": stage.as_str(),
                "txHash": tx_hash,
                "receiptStatus": status.as_str(),
            }),
        )
    }

    /// Moves the full token balance to the destination. `None` when there is
    /// nothing to move.
    async fn settle_token(
        &self,
        token: &TokenDescriptor,
    ) -> Result<Option<TransferRecord>, SweepFailure> {
        let network = &self.network.key;
        let symbol = token.symbol.as_str();

        let balance = self
            .client
            .token_balance(token.address, self.owner)
            .await
            .map_err(|error| {
                self.step_failure(
                    symbol,
                    TransferStage::BalanceCheck,
                    format!("Failed to check {symbol} balance on {network}."),
                    None,
                    error,
                )
            })?;
        if balance.is_zero() {
            log!(
                SweepLogPriority::Info,
                "network={} asset={} balance=0 skipped",
                network,
                symbol
            );
            return Ok(None);
        }

        let tx_hash = self
            .client
            .send_token(token.address, self.destination, balance)
            .await
            .map_err(|error| {
                self.step_failure(
                    symbol,
                    TransferStage::TransferSubmit,
                    format!("Failed to submit {symbol} transfer on {network}."),
                    None,
                    error,
                )
            })?;

        let receipt = self.client.wait_for_receipt(&tx_hash).await.map_err(|error| {
            self.step_failure(
                symbol,
                TransferStage::TransferReceipt,
                format!("Failed to confirm {symbol} transfer on {network}."),
                Some(&tx_hash),
                error,
            )
        })?;
        if receipt.status != ReceiptStatus::Success {
            return Err(self.reverted(
                symbol,
                TransferStage::TransferReceipt,
                format!("{symbol} transfer reverted on {network}."),
                &tx_hash,
                receipt.status,
            ));
        }

        let amount = format_units(balance, token.decimals);
        log!(
            SweepLogPriority::Info,
            "network={} asset={} amount={} tx={} transferred",
            network,
            symbol,
            amount,
            tx_hash
        );
        Ok(Some(TransferRecord {
            network: network.clone(),
            asset_type: AssetType::Token,
            symbol: token.symbol.clone(),
            amount,
            tx_hash,
        }))
    }

    /// Fee per gas unit, priority tip and envelope. The priority-fee-aware
    /// estimate wins when the chain reports one; otherwise the legacy gas
    /// price is used for both and the transfer goes out as a legacy tx.
    async fn native_fee(&self) -> Result<(U256, U256, FeeMode), String> {
        if let Some(rate) = self.client.estimate_fee_rate().await? {
            if !rate.max_fee_per_gas.is_zero() {
                let priority = rate.max_priority_fee_per_gas.min(rate.max_fee_per_gas);
                return Ok((rate.max_fee_per_gas, priority, FeeMode::Eip1559));
            }
        }
        let price = self.client.legacy_gas_price().await?;
        if price.is_zero() {
            return Err("node reported a zero gas price".to_string());
        }
        Ok((price, price, FeeMode::Legacy))
    }

    /// Sends the native balance minus the gas reserve. `None` when the wallet
    /// holds no native balance.
    async fn settle_native(&self) -> Result<Option<TransferRecord>, SweepFailure> {
        let network = &self.network.key;
        let symbol = self.network.native_symbol.as_str();
        let decimals = self.network.native_decimals;

        let balance = self
            .client
            .native_balance(self.owner)
            .await
            .map_err(|error| {
                self.step_failure(
                    symbol,
                    TransferStage::NativeBalance,
                    format!("Failed to read native balance on {network}."),
                    None,
                    error,
                )
            })?;
        if balance.is_zero() {
            log!(
                SweepLogPriority::Info,
                "network={} asset={} balance=0 skipped",
                network,
                symbol
            );
            return Ok(None);
        }

        let (gas_price, priority_fee, mode) = self.native_fee().await.map_err(|error| {
            self.step_failure(
                symbol,
                TransferStage::NativeGasPrice,
                format!("Failed to estimate gas price for native transfer on {network}."),
                None,
                error,
            )
        })?;

        let gas_units = self
            .client
            .estimate_gas(self.owner, self.destination, U256::ZERO)
            .await
            .map_err(|error| {
                self.step_failure(
                    symbol,
                    TransferStage::NativeGasEstimate,
                    format!("Failed to estimate native transfer gas on {network}."),
                    None,
                    error,
                )
            })?;

        let plan = plan_native_sweep(balance, gas_units, gas_price);
        if !plan.can_sweep() {
            return Err(SweepFailure::new(
                FailureCode::InsufficientSweepGas,
                format!("Insufficient {symbol} on {network} to complete native asset sweep."),
                json!({
                    "network": network,
                    "balanceMnt": format_units(plan.balance, decimals),
                    "requiredMnt": format_units(plan.reserve, decimals),
                    "shortfallMnt": format_units(plan.shortfall, decimals),
                    "destination": to_hex(&self.destination),
                }),
            ));
        }

        let quote = GasQuote {
            gas_limit: gas_units,
            gas_price,
            priority_fee,
            mode,
        };
        let tx_hash = self
            .client
            .send_native(self.destination, plan.sendable, &quote)
            .await
            .map_err(|error| {
                self.step_failure(
                    symbol,
                    TransferStage::NativeTransferSubmit,
                    format!("Failed to submit native transfer on {network}."),
                    None,
                    error,
                )
            })?;

        let receipt = self.client.wait_for_receipt(&tx_hash).await.map_err(|error| {
            self.step_failure(
                symbol,
                TransferStage::NativeTransferReceipt,
                format!("Failed to confirm native transfer on {network}."),
                Some(&tx_hash),
                error,
            )
        })?;
        if receipt.status != ReceiptStatus::Success {
            return Err(self.reverted(
                symbol,
                TransferStage::NativeTransferReceipt,
                format!("Native transfer reverted on {network}."),
                &tx_hash,
                receipt.status,
            ));
        }

        let amount = format_units(plan.sendable, decimals);
        log!(
            SweepLogPriority::Info,
            "network={} asset={} amount={} reserve={} tx={} transferred",
            network,
            symbol,
            amount,
            plan.reserve,
            tx_hash
        );
        Ok(Some(TransferRecord {
            network: network.clone(),
            asset_type: AssetType::Native,
            symbol: symbol.to_string(),
            amount,
            tx_hash,
        }))
    }
}

async fn settle_network(
    attempt: &mut SweepAttempt,
    settlement: &NetworkSettlement<'_>,
    tokens: &[TokenDescriptor],
    transfers: &mut Vec<TransferRecord>,
) -> Result<(), SweepFailure> {
    for token in tokens {
        attempt.advance(SweepEvent::SettleToken {
            network: settlement.network.key.clone(),
            symbol: token.symbol.clone(),
        })?;
        match settlement.settle_token(token).await {
            Ok(Some(record)) => transfers.push(record),
            Ok(None) => {}
            Err(failure) => return Err(attempt.fail(failure)),
        }
    }

    attempt.advance(SweepEvent::SettleNative {
        network: settlement.network.key.clone(),
    })?;
    match settlement.settle_native().await {
        Ok(Some(record)) => transfers.push(record),
        Ok(None) => {}
        Err(failure) => return Err(attempt.fail(failure)),
    }
    Ok(())
}

async fn settle_all(
    attempt: &mut SweepAttempt,
    context: &SweepContext,
    networks: &[NetworkProfile],
    signer: &dyn SignerPort,
    factory: &dyn ChainClientFactory,
) -> Result<SweepSummary, SweepFailure> {
    let owner = signer.address();
    let destination = context.destination();
    let mut transfers = Vec::new();

    for network in networks {
        let client = match factory.connect(network, signer) {
            Ok(client) => client,
            Err(error) => {
                return Err(attempt.fail(SweepFailure::new(
                    FailureCode::AssetTransferFailed,
                    format!("Failed to connect to {}.", network.key),
                    json!({
                        "network": network.key,
                        "stage": TransferStage::ClientSetup.as_str(),
                        "message": error,
                    }),
                )))
            }
        };
        let settlement = NetworkSettlement {
            network,
            client: client.as_ref(),
            owner,
            destination,
        };
        settle_network(
            attempt,
            &settlement,
            context.tokens().tokens_for(&network.key),
            &mut transfers,
        )
        .await?;
    }

    attempt.advance(SweepEvent::Completed)?;
    log!(
        SweepLogPriority::Info,
        "sweep={} settled from={} destination={} transfers={}",
        attempt.label,
        to_hex(&owner),
        to_hex(&destination),
        transfers.len()
    );
    Ok(SweepSummary {
        from: owner,
        destination,
        transfers,
    })
}

/// Drains the signer's wallet on every network, in order, to the context's
/// destination. Fails fast: the first failing step ends the attempt and
/// transfers confirmed before it are not reported.
///
/// Unguarded: this does not take the per-agent [`SweepGuardRegistry`] entry.
/// Callers that may race on the same wallet go through [`SweepEngine::sweep`].
pub async fn sweep_with_signer(
    context: &SweepContext,
    networks: &[NetworkProfile],
    signer: &dyn SignerPort,
    factory: &dyn ChainClientFactory,
) -> Result<SweepSummary, SweepFailure> {
    let mut attempt = SweepAttempt::new(to_hex(&signer.address()));
    attempt.advance(SweepEvent::Begin)?;
    attempt.advance(SweepEvent::PreflightPassed)?;
    settle_all(&mut attempt, context, networks, signer, factory).await
}

// ── Single-flight guard ─────────────────────────────────────────────────────

/// Agent ids with a sweep in flight. Clones share the same set.
#[derive(Clone, Debug, Default)]
pub struct SweepGuardRegistry {
    active: Arc<Mutex<BTreeSet<String>>>,
}

/// Held for the duration of one sweep; releases the agent id on drop.
#[derive(Debug)]
pub struct SweepGuard {
    active: Arc<Mutex<BTreeSet<String>>>,
    agent_id: String,
}

fn lock_active(active: &Mutex<BTreeSet<String>>) -> MutexGuard<'_, BTreeSet<String>> {
    active
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SweepGuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, agent_id: &str) -> Result<SweepGuard, SweepFailure> {
        if !lock_active(&self.active).insert(agent_id.to_string()) {
            return Err(SweepFailure::new(
                FailureCode::SweepInProgress,
                "An asset sweep is already running for this agent.",
                json!({ "agentId": agent_id }),
            ));
        }
        Ok(SweepGuard {
            active: Arc::clone(&self.active),
            agent_id: agent_id.to_string(),
        })
    }

    pub fn is_active(&self, agent_id: &str) -> bool {
        lock_active(&self.active).contains(agent_id)
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        lock_active(&self.active).remove(&self.agent_id);
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

pub struct SweepEngine<F> {
    config: SweepConfig,
    factory: F,
    guards: SweepGuardRegistry,
}

impl<F: ChainClientFactory> SweepEngine<F> {
    pub fn new(config: SweepConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            guards: SweepGuardRegistry::new(),
        }
    }

    /// Shares the in-flight set with other engines in the process.
    pub fn with_guards(mut self, guards: SweepGuardRegistry) -> Self {
        self.guards = guards;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn guards(&self) -> &SweepGuardRegistry {
        &self.guards
    }

    pub fn preflight(&self, record: &AgentRecord) -> Result<SweepContext, SweepFailure> {
        preflight_sweep(record, &self.config.tokens, &self.config.network_keys())
    }

    /// Preflight, then drain the agent wallet across all configured networks.
    /// Refuses to run twice concurrently for the same agent.
    pub async fn sweep(
        &self,
        record: &AgentRecord,
        resolver: &dyn KeyResolver,
    ) -> Result<SweepSummary, SweepFailure> {
        let _guard = self.guards.acquire(&record.id)?;
        let mut attempt = SweepAttempt::new(record.id.clone());
        attempt.advance(SweepEvent::Begin)?;

        let context = match self.preflight(record) {
            Ok(context) => context,
            Err(failure) => return Err(attempt.deny(failure)),
        };
        attempt.advance(SweepEvent::PreflightPassed)?;

        let signer = match build_signer(record, resolver) {
            Ok(signer) => signer,
            Err(failure) => return Err(attempt.fail(failure)),
        };
        log!(
            SweepLogPriority::Info,
            "sweep={} started from={} destination={} networks={}",
            record.id,
            to_hex(&signer.address()),
            to_hex(&context.destination()),
            self.config.network_keys().join(",")
        );

        settle_all(
            &mut attempt,
            &context,
            &self.config.networks,
            &signer,
            &self.factory,
        )
        .await
    }
}

fn signer_setup_failure(record: &AgentRecord, message: String) -> SweepFailure {
    SweepFailure::new(
        FailureCode::AssetTransferFailed,
        "Failed to prepare the agent wallet signer.",
        json!({
            "agentId": record.id,
            "stage": TransferStage::SignerSetup.as_str(),
            "message": message,
        }),
    )
}

/// Builds the wallet signer and checks it controls the recorded wallet, when
/// the record names one.
fn build_signer(
    record: &AgentRecord,
    resolver: &dyn KeyResolver,
) -> Result<LocalKeySigner, SweepFailure> {
    let signer = LocalKeySigner::from_record(record, resolver)
        .map_err(|error| signer_setup_failure(record, error))?;
    let recorded = record
        .wallet_address
        .as_deref()
        .map(str::trim)
        .filter(|address| !address.is_empty());
    if let Some(recorded) = recorded {
        let expected = parse_evm_address(recorded)
            .map_err(|error| signer_setup_failure(record, format!("wallet address: {error}")))?;
        if expected != signer.address() {
            return Err(signer_setup_failure(
                record,
                format!(
                    "signing key controls {} but the agent wallet is {}",
                    to_hex(&signer.address()),
                    to_hex(&expected)
                ),
            ));
        }
    }
    Ok(signer)
}
