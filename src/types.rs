use ethers::types::{Address, H256, U256};
use std::fmt;

use crate::chains::Chain;

/// Placeholder contract the balance indexers use for the chain's native coin.
pub const NATIVE_TOKEN_SENTINEL: Address = Address::repeat_byte(0xee);

/// A smart account the daemon keeps consolidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedAccount {
    pub address: Address,
    pub chains: Vec<Chain>,
}

impl ManagedAccount {
    pub fn new(address: Address, chains: Vec<Chain>) -> Self {
        Self { address, chains }
    }
}

/// On-chain `config()` of a smart account, read fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountConfig {
    pub preferred_token: Address,
    pub preferred_chain_id: u64,
    pub nonce: U256,
}

impl AccountConfig {
    pub fn is_configured(&self) -> bool {
        !self.preferred_token.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub contract_address: Address,
    pub amount_raw: U256,
    pub source_chain_id: u64,
}

impl TokenBalance {
    /// Zero balances and native-coin placeholders never reach the decision step.
    pub fn is_sweepable(&self) -> bool {
        !self.amount_raw.is_zero()
            && self.contract_address != NATIVE_TOKEN_SENTINEL
            && !self.contract_address.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceRecord {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount_raw: U256,
}

impl AllowanceRecord {
    pub fn covers(&self, required: U256) -> bool {
        self.amount_raw >= required
    }
}

/// CCIP-style destination chain identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainSelector(pub u64);

impl fmt::Display for ChainSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approve,
    Swap,
    Bridge,
}

impl TxKind {
    pub fn label(&self) -> &'static str {
        match self {
            TxKind::Approve => "approve",
            TxKind::Swap => "swap",
            TxKind::Bridge => "bridge",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A submitted transaction the engine is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub hash: H256,
    pub account: Address,
    pub chain: Chain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// Terminal result of waiting on a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Success(TxReceipt),
    Reverted(TxReceipt),
}

/// Where a previously submitted transaction currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Mined,
    Dropped,
}
