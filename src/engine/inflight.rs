use dashmap::DashMap;
use ethers::types::Address;
use std::collections::HashSet;

use crate::chains::Chain;
use crate::types::PendingTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InFlightKey {
    pub account: Address,
    pub chain: Chain,
    pub token: Address,
}

/// Swap/bridge transactions submitted but not yet seen mined.
///
/// A marker is set on submission and cleared on a confirmed or reverted
/// receipt. A confirmation timeout leaves it in place, so a later cycle asks
/// the chain about the hash before submitting anything new for that token.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: DashMap<InFlightKey, PendingTransaction>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: InFlightKey, pending: PendingTransaction) {
        self.entries.insert(key, pending);
    }

    pub fn get(&self, key: &InFlightKey) -> Option<PendingTransaction> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    pub fn clear(&self, key: &InFlightKey) -> Option<PendingTransaction> {
        self.entries.remove(key).map(|(_, pending)| pending)
    }

    /// Drops the markers of `account` on `chain` whose token is no longer
    /// held. Returns how many were dropped.
    pub fn clear_missing(&self, account: Address, chain: Chain, held: &HashSet<Address>) -> usize {
        let mut dropped = 0;
        self.entries.retain(|key, _| {
            let keep = key.account != account || key.chain != chain || held.contains(&key.token);
            if !keep {
                dropped += 1;
            }
            keep
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
