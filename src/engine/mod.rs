use ethers::types::{Address, H256, U256};
use log::{debug, error, info, warn};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{sync::watch, task::JoinSet};

use crate::balances::BalanceSource;
use crate::chains::{self, tokens, Chain};
use crate::error::{ErrorClass, SweepError};
use crate::metrics;
use crate::protocols::{AccountGateway, SwapQuoter};
use crate::types::{
    AccountConfig, Confirmation, ManagedAccount, PendingTransaction, TokenBalance, TxKind, TxStatus,
};

pub mod approval;
pub mod decision;
pub mod inflight;
pub mod state;

use approval::{ensure_allowance, AllowanceOutcome};
use decision::{decide, Decision};
use inflight::{InFlightKey, InFlightRegistry};
use state::{TokenOutcome, TokenState};

/// Default native fee allowance attached to `bridge` (0.001 of the native coin).
pub const DEFAULT_BRIDGE_FEE_WEI: u64 = 1_000_000_000_000_000;

pub const DEFAULT_ACCOUNT_TIMEOUT_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub interval: Duration,
    pub bridge_fee: U256,
    pub bridge_preflight: bool,
    /// Upper bound on one account's sweep within a cycle.
    pub account_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            bridge_fee: U256::from(DEFAULT_BRIDGE_FEE_WEI),
            bridge_preflight: true,
            account_timeout: Duration::from_secs(DEFAULT_ACCOUNT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub struct AccountReport {
    pub account: Address,
    pub tokens: Vec<TokenOutcome>,
    /// Chains skipped before any token was looked at.
    pub chain_errors: Vec<(Chain, SweepError)>,
    /// Set when the sweep was cut off; `tokens` is then empty.
    pub error: Option<SweepError>,
}

impl AccountReport {
    fn new(account: Address) -> Self {
        Self {
            account,
            tokens: Vec::new(),
            chain_errors: Vec::new(),
            error: None,
        }
    }

    fn stalled(account: Address, error: SweepError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(account)
        }
    }

    pub fn count(&self, state: TokenState) -> usize {
        self.tokens.iter().filter(|t| t.state == state).count()
    }
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub accounts: Vec<AccountReport>,
    /// Account tasks that panicked or were cancelled.
    pub aborted: usize,
    pub duration: Duration,
}

impl CycleReport {
    pub fn account(&self, address: Address) -> Option<&AccountReport> {
        self.accounts.iter().find(|r| r.account == address)
    }

    pub fn count(&self, state: TokenState) -> usize {
        self.accounts.iter().map(|r| r.count(state)).sum()
    }
}

/// Drives the consolidation loop over a fixed set of managed accounts.
///
/// Accounts are swept concurrently, one task each. Within an account, chains
/// and then tokens are processed strictly in order, so an approval is always
/// confirmed before the swap or bridge that depends on it is submitted.
pub struct SweepEngine {
    balances: Arc<dyn BalanceSource>,
    quoter: Arc<dyn SwapQuoter>,
    gateways: HashMap<Chain, Arc<dyn AccountGateway>>,
    settings: EngineSettings,
    inflight: InFlightRegistry,
    cycles: AtomicU64,
}

impl SweepEngine {
    pub fn new(
        balances: Arc<dyn BalanceSource>,
        quoter: Arc<dyn SwapQuoter>,
        gateways: HashMap<Chain, Arc<dyn AccountGateway>>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            balances,
            quoter,
            gateways,
            settings,
            inflight: InFlightRegistry::new(),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn inflight(&self) -> &InFlightRegistry {
        &self.inflight
    }

    /// Sweeps every account, sleeps `interval`, and repeats until `shutdown`
    /// flips to `true` (or its sender goes away). A cycle in progress is always
    /// finished before returning.
    pub async fn run(self: Arc<Self>, accounts: Vec<ManagedAccount>, mut shutdown: watch::Receiver<bool>) {
        metrics::set_accounts_managed(accounts.len());
        info!(
            "Sweeping {} account(s) every {:?}",
            accounts.len(),
            self.settings.interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle(&accounts).await;
            log_cycle_summary(&report);

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping");
                        break;
                    }
                }
            }
        }

        info!("Sweep loop stopped");
    }

    /// One pass over all accounts. Never fails: every error ends up inside the
    /// returned report.
    pub async fn run_cycle(self: &Arc<Self>, accounts: &[ManagedAccount]) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        debug!("Cycle {} starting", cycle);

        let account_timeout = self.settings.account_timeout;
        let mut set = JoinSet::new();
        for (index, account) in accounts.iter().cloned().enumerate() {
            let engine = Arc::clone(self);
            set.spawn(async move {
                let sweep = engine.sweep_account(&account);
                let report = match tokio::time::timeout(account_timeout, sweep).await {
                    Ok(report) => report,
                    Err(_) => {
                        let e = SweepError::AccountTimeout {
                            account: account.address,
                            waited: account_timeout,
                        };
                        warn!("[transient] {}", e);
                        metrics::record_failure(e.class());
                        AccountReport::stalled(account.address, e)
                    }
                };
                (index, report)
            });
        }

        let mut reports = Vec::with_capacity(accounts.len());
        let mut aborted = 0;
        while let Some(res) = set.join_next().await {
            match res {
                Ok(entry) => reports.push(entry),
                Err(e) => {
                    error!("Account task failed: {}", e);
                    aborted += 1;
                }
            }
        }
        reports.sort_by_key(|(index, _)| *index);

        let duration = started.elapsed();
        metrics::record_cycle(duration);

        CycleReport {
            cycle,
            accounts: reports.into_iter().map(|(_, report)| report).collect(),
            aborted,
            duration,
        }
    }

    /// Sweeps every scanned chain of one account. Failures stay inside the
    /// report; nothing here can stop another account.
    pub async fn sweep_account(&self, account: &ManagedAccount) -> AccountReport {
        let mut report = AccountReport::new(account.address);
        let mut seen = HashSet::new();

        for &chain in &account.chains {
            let (gateway, config, balances) = match self.load_chain(account.address, chain).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    log_failure(account.address, chain, None, &e);
                    metrics::record_failure(e.class());
                    report.chain_errors.push((chain, e));
                    continue;
                }
            };

            let held: HashSet<Address> = balances
                .iter()
                .filter(|b| b.is_sweepable())
                .map(|b| b.contract_address)
                .collect();
            let released = self.inflight.clear_missing(account.address, chain, &held);
            if released > 0 {
                debug!(
                    "Released {} in-flight marker(s) for {:?} on {}: balance gone",
                    released, account.address, chain
                );
            }

            for balance in balances {
                if !balance.is_sweepable() {
                    continue;
                }
                if !seen.insert((chain, balance.contract_address)) {
                    debug!(
                        "Duplicate balance entry for {:?} on {}, ignoring",
                        balance.contract_address, chain
                    );
                    continue;
                }

                let outcome = self
                    .sweep_token(gateway.as_ref(), account.address, chain, &config, balance)
                    .await;
                metrics::record_token(outcome.state);
                report.tokens.push(outcome);
            }
        }

        report
    }

    async fn load_chain(
        &self,
        account: Address,
        chain: Chain,
    ) -> Result<(Arc<dyn AccountGateway>, AccountConfig, Vec<TokenBalance>), SweepError> {
        let gateway = self
            .gateways
            .get(&chain)
            .cloned()
            .ok_or(SweepError::MissingProvider(chain.id()))?;

        // Re-read every cycle: the owner can change it between polls.
        let config = gateway.account_config(account).await?;
        if !config.is_configured() {
            return Err(SweepError::AccountNotConfigured {
                account,
                chain_id: chain.id(),
            });
        }

        let balances = self.balances.fetch_balances(account, chain).await?;
        Ok((gateway, config, balances))
    }

    async fn sweep_token(
        &self,
        gateway: &dyn AccountGateway,
        account: Address,
        chain: Chain,
        config: &AccountConfig,
        balance: TokenBalance,
    ) -> TokenOutcome {
        let mut outcome = TokenOutcome::discovered(chain, balance.contract_address, balance.amount_raw);
        if let Err(e) = self
            .drive_token(gateway, account, chain, config, balance, &mut outcome)
            .await
        {
            log_failure(account, chain, Some(balance.contract_address), &e);
            metrics::record_failure(e.class());
            outcome.fail(e);
        }
        outcome
    }

    async fn drive_token(
        &self,
        gateway: &dyn AccountGateway,
        account: Address,
        chain: Chain,
        config: &AccountConfig,
        balance: TokenBalance,
        outcome: &mut TokenOutcome,
    ) -> Result<(), SweepError> {
        let key = InFlightKey {
            account,
            chain,
            token: balance.contract_address,
        };
        if self.blocked_by_inflight(gateway, &key).await? {
            outcome.advance(TokenState::Skipped);
            return Ok(());
        }

        let decision = decide(&balance, config);
        outcome.decided(decision);
        debug!(
            "{:?} holds {} of {:?} on {}: {}",
            account,
            balance.amount_raw,
            balance.contract_address,
            chain,
            decision.label()
        );

        match decision {
            Decision::Noop => {
                outcome.advance(TokenState::Skipped);
                Ok(())
            }
            Decision::SwapThenHoldOrBridge { bridge_after } => {
                self.swap(gateway, key, config, &balance, outcome).await?;
                if bridge_after {
                    info!(
                        "Swapped {:?} on {}; output will be bridged to chain {} next cycle",
                        balance.contract_address, chain, config.preferred_chain_id
                    );
                }
                Ok(())
            }
            Decision::BridgeOnly => self.bridge(gateway, key, config, &balance, outcome).await,
        }
    }

    /// True while an earlier swap/bridge for this token is still unmined.
    async fn blocked_by_inflight(
        &self,
        gateway: &dyn AccountGateway,
        key: &InFlightKey,
    ) -> Result<bool, SweepError> {
        let pending = match self.inflight.get(key) {
            Some(pending) => pending,
            None => return Ok(false),
        };

        match gateway.transaction_status(pending.hash).await? {
            TxStatus::Pending => {
                info!(
                    "{} {:?} for {:?} on {} still pending, not resubmitting",
                    pending.kind, pending.hash, key.token, key.chain
                );
                Ok(true)
            }
            TxStatus::Mined => {
                // The balance snapshot may predate the mined tx; look again next cycle.
                info!(
                    "{} {:?} for {:?} on {} was mined after its wait expired",
                    pending.kind, pending.hash, key.token, key.chain
                );
                self.inflight.clear(key);
                Ok(true)
            }
            TxStatus::Dropped => {
                warn!(
                    "{} {:?} for {:?} on {} was dropped, retrying",
                    pending.kind, pending.hash, key.token, key.chain
                );
                self.inflight.clear(key);
                Ok(false)
            }
        }
    }

    async fn swap(
        &self,
        gateway: &dyn AccountGateway,
        key: InFlightKey,
        config: &AccountConfig,
        balance: &TokenBalance,
        outcome: &mut TokenOutcome,
    ) -> Result<(), SweepError> {
        let spender = chains::swap_router(key.chain)?;
        self.approve(gateway, key, spender, balance.amount_raw, outcome)
            .await?;

        let calldata = self
            .quoter
            .quote_and_build_swap(
                balance.contract_address,
                config.preferred_token,
                balance.amount_raw,
                key.account,
                key.chain,
            )
            .await?;

        outcome.advance(TokenState::ActionPending);
        let tx_hash = gateway.submit_swap(key.account, calldata).await?;
        self.confirm_action(gateway, key, TxKind::Swap, tx_hash, outcome)
            .await
    }

    async fn bridge(
        &self,
        gateway: &dyn AccountGateway,
        key: InFlightKey,
        config: &AccountConfig,
        balance: &TokenBalance,
        outcome: &mut TokenOutcome,
    ) -> Result<(), SweepError> {
        let selector = chains::resolve_chain_selector(config.preferred_chain_id)?;
        let destination = Chain::try_from(config.preferred_chain_id)?;
        let remote_token = tokens::resolve_on_chain(balance.contract_address, key.chain, destination)
            .ok_or(SweepError::UnresolvedToken {
                token: balance.contract_address,
                chain_id: key.chain.id(),
                destination_chain_id: destination.id(),
            })?;
        debug!(
            "Bridging {:?} on {} to {:?} on {} (selector {})",
            balance.contract_address, key.chain, remote_token, destination, selector
        );

        if self.settings.bridge_preflight {
            if !gateway.is_chain_allowlisted(key.account, selector).await? {
                return Err(SweepError::ChainNotAllowlisted {
                    chain_id: destination.id(),
                    selector: selector.0,
                });
            }
            let quoted = gateway
                .cross_chain_fee(key.account, selector, balance.contract_address, balance.amount_raw)
                .await?;
            if quoted > self.settings.bridge_fee {
                return Err(SweepError::BridgeFeeInsufficient {
                    quoted,
                    allowance: self.settings.bridge_fee,
                });
            }
        }

        let spender = chains::ccip_router(key.chain)?;
        self.approve(gateway, key, spender, balance.amount_raw, outcome)
            .await?;

        outcome.advance(TokenState::ActionPending);
        let tx_hash = gateway
            .submit_bridge(key.account, selector, self.settings.bridge_fee)
            .await?;
        self.confirm_action(gateway, key, TxKind::Bridge, tx_hash, outcome)
            .await
    }

    async fn approve(
        &self,
        gateway: &dyn AccountGateway,
        key: InFlightKey,
        spender: Address,
        required: U256,
        outcome: &mut TokenOutcome,
    ) -> Result<(), SweepError> {
        match ensure_allowance(gateway, key.token, key.account, spender, required).await {
            Ok(AllowanceOutcome::AlreadySufficient) => Ok(()),
            Ok(AllowanceOutcome::Approved(tx_hash)) => {
                outcome.tx_hashes.push(tx_hash);
                outcome.advance(TokenState::ApprovalPending);
                outcome.advance(TokenState::ApprovalConfirmed);
                Ok(())
            }
            Err(e) => {
                if let Some(tx_hash) = e.tx_hash() {
                    outcome.tx_hashes.push(tx_hash);
                    outcome.advance(TokenState::ApprovalPending);
                }
                Err(e)
            }
        }
    }

    async fn confirm_action(
        &self,
        gateway: &dyn AccountGateway,
        key: InFlightKey,
        kind: TxKind,
        tx_hash: H256,
        outcome: &mut TokenOutcome,
    ) -> Result<(), SweepError> {
        metrics::record_tx_submitted(kind);
        outcome.tx_hashes.push(tx_hash);
        self.inflight.insert(
            key,
            PendingTransaction {
                kind,
                hash: tx_hash,
                account: key.account,
                chain: key.chain,
            },
        );
        info!("{} tx {:?} sent for {:?} on {}", kind, tx_hash, key.token, key.chain);

        match gateway.await_confirmation(tx_hash, kind).await {
            Ok(Confirmation::Success(receipt)) => {
                self.inflight.clear(&key);
                metrics::record_tx_confirmed(kind);
                info!(
                    "{} tx {:?} confirmed in block {:?}",
                    kind, tx_hash, receipt.block_number
                );
                outcome.advance(TokenState::ActionConfirmed);
                Ok(())
            }
            Ok(Confirmation::Reverted(_)) => {
                self.inflight.clear(&key);
                let reason = "execution reverted".to_string();
                Err(match kind {
                    TxKind::Bridge => SweepError::BridgeReverted {
                        tx_hash: Some(tx_hash),
                        reason,
                    },
                    _ => SweepError::SwapReverted {
                        tx_hash: Some(tx_hash),
                        reason,
                    },
                })
            }
            // Marker stays: the tx may still land.
            Err(e) => Err(e),
        }
    }
}

fn log_failure(account: Address, chain: Chain, token: Option<Address>, err: &SweepError) {
    let token = token
        .map(|t| format!(" token {:?}", t))
        .unwrap_or_default();
    match err.class() {
        ErrorClass::Transient => {
            warn!("[transient] account {:?} on {}{}: {}", account, chain, token, err)
        }
        ErrorClass::Configuration => {
            error!("[config] account {:?} on {}{}: {}", account, chain, token, err)
        }
        ErrorClass::Transactional => error!(
            "[tx] account {:?} on {}{} (tx {:?}): {}",
            account,
            chain,
            token,
            err.tx_hash(),
            err
        ),
    }
}

fn log_cycle_summary(report: &CycleReport) {
    info!(
        "Cycle {} done in {:?}: {} confirmed, {} skipped, {} failed, {} chain errors, {} stalled, {} aborted",
        report.cycle,
        report.duration,
        report.count(TokenState::ActionConfirmed),
        report.count(TokenState::Skipped),
        report.count(TokenState::Failed),
        report
            .accounts
            .iter()
            .map(|a| a.chain_errors.len())
            .sum::<usize>(),
        report.accounts.iter().filter(|a| a.error.is_some()).count(),
        report.aborted
    );
}
