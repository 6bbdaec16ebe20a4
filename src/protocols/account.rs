use async_trait::async_trait;
use ethers::prelude::*;
use log::{debug, warn};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::Mutex;

#[cfg(test)]
use mockall::automock;

use crate::chains::Chain;
use crate::error::SweepError;
use crate::types::{
    AccountConfig, AllowanceRecord, ChainSelector, Confirmation, TxKind, TxReceipt, TxStatus,
};

// Entry points of the per-user smart account
abigen!(
    SmartAccount,
    r#"[
        function config() external view returns (address token, uint256 chainId, uint256 nonce)
        function approveToken(address token, address spender) external
        function executeSwap(bytes calldata data) external
        function bridge(uint64 destinationChainSelector) external payable
        function allowlistedChains(uint64 chainSelector) external view returns (bool)
        function getCrossChainFee(uint64 destinationChainSelector, address token, uint256 amount) external view returns (uint256)
    ]"#
);

abigen!(
    Erc20,
    r#"[
        function allowance(address owner, address spender) external view returns (uint256)
    ]"#
);

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Everything the engine reads from or submits to one chain.
///
/// Submissions return as soon as the node accepts the transaction;
/// `await_confirmation` is the only place that blocks on inclusion.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountGateway: Send + Sync {
    async fn account_config(&self, account: Address) -> Result<AccountConfig, SweepError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<AllowanceRecord, SweepError>;

    async fn submit_approval(
        &self,
        account: Address,
        token: Address,
        spender: Address,
    ) -> Result<H256, SweepError>;

    async fn submit_swap(&self, account: Address, calldata: Bytes) -> Result<H256, SweepError>;

    async fn submit_bridge(
        &self,
        account: Address,
        selector: ChainSelector,
        fee: U256,
    ) -> Result<H256, SweepError>;

    async fn await_confirmation(
        &self,
        tx_hash: H256,
        kind: TxKind,
    ) -> Result<Confirmation, SweepError>;

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, SweepError>;

    async fn is_chain_allowlisted(
        &self,
        account: Address,
        selector: ChainSelector,
    ) -> Result<bool, SweepError>;

    async fn cross_chain_fee(
        &self,
        account: Address,
        selector: ChainSelector,
        token: Address,
        amount: U256,
    ) -> Result<U256, SweepError>;
}

/// `AccountGateway` over an ethers middleware stack (normally a
/// `SignerMiddleware<Provider<Http>, LocalWallet>`).
///
/// Every managed account on a chain is driven by the same signer, so
/// submissions go out one at a time: the signer's pending nonce is read and
/// the signed transaction broadcast before the next submission starts.
#[derive(Debug)]
pub struct EthersGateway<M> {
    chain: Chain,
    client: Arc<M>,
    tx_timeout: Duration,
    confirmations: u64,
    poll_interval: Duration,
    submit_lock: Mutex<()>,
}

impl<M: Middleware + 'static> EthersGateway<M> {
    pub fn new(chain: Chain, client: Arc<M>, tx_timeout: Duration, confirmations: u64) -> Self {
        Self {
            chain,
            client,
            tx_timeout,
            confirmations: confirmations.max(1),
            poll_interval: RECEIPT_POLL_INTERVAL,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs a submission while holding the chain's signer.
    async fn serialized<T>(&self, submission: impl Future<Output = T>) -> T {
        let _signer = self.submit_lock.lock().await;
        submission.await
    }

    fn smart_account(&self, address: Address) -> SmartAccount<M> {
        SmartAccount::new(address, self.client.clone())
    }

    /// Receipt once it sits `confirmations` deep, polling until then.
    async fn poll_receipt(&self, tx_hash: H256) -> TransactionReceipt {
        loop {
            match self.client.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if let Some(mined_at) = receipt.block_number {
                        match self.client.get_block_number().await {
                            Ok(head) if confirmation_depth(mined_at, head) >= self.confirmations => {
                                return receipt;
                            }
                            Ok(_) => {}
                            Err(e) => warn!("[{}] block number lookup failed: {}", self.chain, e),
                        }
                    }
                }
                Ok(None) => debug!("[{}] {:?} not mined yet", self.chain, tx_hash),
                Err(e) => warn!("[{}] receipt lookup for {:?} failed: {}", self.chain, tx_hash, e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn confirmation_depth(mined_at: U64, head: U64) -> u64 {
    if head < mined_at {
        return 0;
    }
    (head - mined_at).as_u64() + 1
}

fn to_confirmation(receipt: TransactionReceipt) -> Confirmation {
    let succeeded = receipt.status == Some(U64::one());
    let summary = TxReceipt {
        hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|n| n.as_u64()),
        gas_used: receipt.gas_used,
    };
    if succeeded {
        Confirmation::Success(summary)
    } else {
        Confirmation::Reverted(summary)
    }
}

#[async_trait]
impl<M: Middleware + 'static> AccountGateway for EthersGateway<M> {
    async fn account_config(&self, account: Address) -> Result<AccountConfig, SweepError> {
        let (preferred_token, chain_id, nonce) = self
            .smart_account(account)
            .config()
            .call()
            .await
            .map_err(|e| SweepError::rpc("config", e))?;

        if chain_id > U256::from(u64::MAX) {
            return Err(SweepError::Rpc {
                context: "config",
                reason: format!("preferred chain id {} does not fit u64", chain_id),
            });
        }

        Ok(AccountConfig {
            preferred_token,
            preferred_chain_id: chain_id.as_u64(),
            nonce,
        })
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<AllowanceRecord, SweepError> {
        let amount_raw = Erc20::new(token, self.client.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(|e| SweepError::rpc("allowance", e))?;

        Ok(AllowanceRecord {
            token,
            owner,
            spender,
            amount_raw,
        })
    }

    async fn submit_approval(
        &self,
        account: Address,
        token: Address,
        spender: Address,
    ) -> Result<H256, SweepError> {
        let call = self.smart_account(account).approve_token(token, spender);
        let pending = self.serialized(call.send()).await.map_err(|e| SweepError::ApprovalFailed {
            token,
            spender,
            tx_hash: None,
            reason: e.to_string(),
        })?;
        Ok(pending.tx_hash())
    }

    async fn submit_swap(&self, account: Address, calldata: Bytes) -> Result<H256, SweepError> {
        let call = self.smart_account(account).execute_swap(calldata);
        let pending = self.serialized(call.send()).await.map_err(|e| SweepError::SwapReverted {
            tx_hash: None,
            reason: e.to_string(),
        })?;
        Ok(pending.tx_hash())
    }

    async fn submit_bridge(
        &self,
        account: Address,
        selector: ChainSelector,
        fee: U256,
    ) -> Result<H256, SweepError> {
        let call = self.smart_account(account).bridge(selector.0).value(fee);
        let pending = self.serialized(call.send()).await.map_err(|e| SweepError::BridgeReverted {
            tx_hash: None,
            reason: e.to_string(),
        })?;
        Ok(pending.tx_hash())
    }

    async fn await_confirmation(
        &self,
        tx_hash: H256,
        kind: TxKind,
    ) -> Result<Confirmation, SweepError> {
        match tokio::time::timeout(self.tx_timeout, self.poll_receipt(tx_hash)).await {
            Ok(receipt) => Ok(to_confirmation(receipt)),
            Err(_) => Err(SweepError::ConfirmationTimeout {
                kind,
                tx_hash,
                waited: self.tx_timeout,
            }),
        }
    }

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, SweepError> {
        let receipt = self
            .client
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| SweepError::rpc("eth_getTransactionReceipt", e))?;
        if receipt.is_some() {
            return Ok(TxStatus::Mined);
        }

        let tx = self
            .client
            .get_transaction(tx_hash)
            .await
            .map_err(|e| SweepError::rpc("eth_getTransactionByHash", e))?;
        Ok(match tx {
            Some(_) => TxStatus::Pending,
            None => TxStatus::Dropped,
        })
    }

    async fn is_chain_allowlisted(
        &self,
        account: Address,
        selector: ChainSelector,
    ) -> Result<bool, SweepError> {
        self.smart_account(account)
            .allowlisted_chains(selector.0)
            .call()
            .await
            .map_err(|e| SweepError::rpc("allowlistedChains", e))
    }

    async fn cross_chain_fee(
        &self,
        account: Address,
        selector: ChainSelector,
        token: Address,
        amount: U256,
    ) -> Result<U256, SweepError> {
        self.smart_account(account)
            .get_cross_chain_fee(selector.0, token, amount)
            .call()
            .await
            .map_err(|e| SweepError::rpc("getCrossChainFee", e))
    }
}
