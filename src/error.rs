use ethers::types::{Address, H256, U256};
use std::time::Duration;
use thiserror::Error;

use crate::types::TxKind;

/// How a failure is handled by the sweep loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Upstream hiccup; the next poll cycle retries.
    Transient,
    /// Needs an operator; the token is skipped every cycle until fixed.
    Configuration,
    /// An on-chain transaction failed or never confirmed.
    Transactional,
}

impl ErrorClass {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Configuration => "config",
            ErrorClass::Transactional => "tx",
        }
    }
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: &'static str, reason: String },

    #[error("{service} rate limited the request")]
    RateLimited { service: &'static str },

    #[error("no swap route from {src:?} to {dst:?} on chain {chain_id}: {reason}")]
    NoRoute {
        src: Address,
        dst: Address,
        chain_id: u64,
        reason: String,
    },

    #[error("chain {0} has no bridge/router mapping")]
    UnsupportedChain(u64),

    #[error("token {token:?} on chain {chain_id} has no known counterpart on chain {destination_chain_id}")]
    UnresolvedToken {
        token: Address,
        chain_id: u64,
        destination_chain_id: u64,
    },

    #[error("destination selector {selector} (chain {chain_id}) is not allowlisted on the account")]
    ChainNotAllowlisted { chain_id: u64, selector: u64 },

    #[error("no RPC provider configured for chain {0}")]
    MissingProvider(u64),

    #[error("account {account:?} has no preferred token configured on chain {chain_id}")]
    AccountNotConfigured { account: Address, chain_id: u64 },

    #[error("approval of {token:?} for {spender:?} failed (tx {tx_hash:?}): {reason}")]
    ApprovalFailed {
        token: Address,
        spender: Address,
        tx_hash: Option<H256>,
        reason: String,
    },

    #[error("swap reverted (tx {tx_hash:?}): {reason}")]
    SwapReverted { tx_hash: Option<H256>, reason: String },

    #[error("bridge reverted (tx {tx_hash:?}): {reason}")]
    BridgeReverted { tx_hash: Option<H256>, reason: String },

    #[error("bridge fee quote {quoted} exceeds the fixed allowance {allowance}")]
    BridgeFeeInsufficient { quoted: U256, allowance: U256 },

    #[error("{kind} tx {tx_hash:?} not confirmed after {waited:?}")]
    ConfirmationTimeout {
        kind: TxKind,
        tx_hash: H256,
        waited: Duration,
    },

    #[error("rpc call {context} failed: {reason}")]
    Rpc { context: &'static str, reason: String },

    #[error("sweep of account {account:?} did not finish within {waited:?}")]
    AccountTimeout { account: Address, waited: Duration },
}

impl SweepError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SweepError::UpstreamUnavailable { .. }
            | SweepError::RateLimited { .. }
            | SweepError::NoRoute { .. }
            | SweepError::Rpc { .. }
            | SweepError::AccountTimeout { .. } => ErrorClass::Transient,
            SweepError::UnsupportedChain(_)
            | SweepError::UnresolvedToken { .. }
            | SweepError::ChainNotAllowlisted { .. }
            | SweepError::MissingProvider(_)
            | SweepError::AccountNotConfigured { .. } => ErrorClass::Configuration,
            SweepError::ApprovalFailed { .. }
            | SweepError::SwapReverted { .. }
            | SweepError::BridgeReverted { .. }
            | SweepError::BridgeFeeInsufficient { .. }
            | SweepError::ConfirmationTimeout { .. } => ErrorClass::Transactional,
        }
    }

    /// Hash of the transaction involved, when one was submitted.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            SweepError::ApprovalFailed { tx_hash, .. }
            | SweepError::SwapReverted { tx_hash, .. }
            | SweepError::BridgeReverted { tx_hash, .. } => *tx_hash,
            SweepError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }

    pub(crate) fn rpc(context: &'static str, err: impl std::fmt::Display) -> Self {
        SweepError::Rpc {
            context,
            reason: err.to_string(),
        }
    }
}
