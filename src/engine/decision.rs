use crate::types::{AccountConfig, TokenBalance};

/// What to do with one discovered balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Noop,
    /// Swap into the preferred token on the balance's own chain. When
    /// `bridge_after` is set the output still sits on the wrong chain and is
    /// bridged once it is rediscovered on a later cycle.
    SwapThenHoldOrBridge { bridge_after: bool },
    BridgeOnly,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Noop => "noop",
            Decision::SwapThenHoldOrBridge { .. } => "swap",
            Decision::BridgeOnly => "bridge",
        }
    }
}

/// Pure function of the balance and the account's config on that chain.
pub fn decide(balance: &TokenBalance, config: &AccountConfig) -> Decision {
    if !balance.is_sweepable() || !config.is_configured() {
        return Decision::Noop;
    }

    let on_preferred_chain = balance.source_chain_id == config.preferred_chain_id;
    if balance.contract_address != config.preferred_token {
        return Decision::SwapThenHoldOrBridge {
            bridge_after: !on_preferred_chain,
        };
    }
    if !on_preferred_chain {
        return Decision::BridgeOnly;
    }
    Decision::Noop
}
