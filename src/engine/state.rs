use ethers::types::{Address, H256, U256};

use super::decision::Decision;
use crate::chains::Chain;
use crate::error::SweepError;

/// Per-token progress within a single cycle. Nothing carries over between
/// cycles; every cycle starts again from `Discovered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenState {
    Discovered,
    Decided,
    Skipped,
    ApprovalPending,
    ApprovalConfirmed,
    ActionPending,
    ActionConfirmed,
    Failed,
}

impl TokenState {
    pub fn label(&self) -> &'static str {
        match self {
            TokenState::Discovered => "discovered",
            TokenState::Decided => "decided",
            TokenState::Skipped => "skipped",
            TokenState::ApprovalPending => "approval_pending",
            TokenState::ApprovalConfirmed => "approval_confirmed",
            TokenState::ActionPending => "action_pending",
            TokenState::ActionConfirmed => "action_confirmed",
            TokenState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TokenState::Skipped | TokenState::ActionConfirmed | TokenState::Failed
        )
    }

    pub fn can_transition_to(&self, next: TokenState) -> bool {
        use TokenState::*;
        match (*self, next) {
            (Discovered, Decided) | (Discovered, Skipped) | (Discovered, Failed) => true,
            (Decided, Skipped) | (Decided, ApprovalPending) | (Decided, ActionPending) => true,
            (ApprovalPending, ApprovalConfirmed) => true,
            (ApprovalConfirmed, ActionPending) => true,
            (ActionPending, ActionConfirmed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Result of processing one balance in one cycle.
#[derive(Debug)]
pub struct TokenOutcome {
    pub chain: Chain,
    pub token: Address,
    pub amount: U256,
    pub decision: Option<Decision>,
    pub state: TokenState,
    pub history: Vec<TokenState>,
    pub tx_hashes: Vec<H256>,
    pub error: Option<SweepError>,
}

impl TokenOutcome {
    pub fn discovered(chain: Chain, token: Address, amount: U256) -> Self {
        Self {
            chain,
            token,
            amount,
            decision: None,
            state: TokenState::Discovered,
            history: vec![TokenState::Discovered],
            tx_hashes: Vec::new(),
            error: None,
        }
    }

    /// Moves to `next`. Illegal moves are ignored and reported as `false`.
    pub fn advance(&mut self, next: TokenState) -> bool {
        if !self.state.can_transition_to(next) {
            log::debug!(
                "Ignoring {} -> {} for {:?} on {}",
                self.state.label(),
                next.label(),
                self.token,
                self.chain
            );
            return false;
        }
        self.state = next;
        self.history.push(next);
        true
    }

    pub fn decided(&mut self, decision: Decision) {
        self.decision = Some(decision);
        self.advance(TokenState::Decided);
    }

    pub fn fail(&mut self, err: SweepError) {
        self.advance(TokenState::Failed);
        self.error = Some(err);
    }

    pub fn passed_through(&self, state: TokenState) -> bool {
        self.history.contains(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_with_approval() {
        let mut outcome = TokenOutcome::discovered(Chain::Base, Address::zero(), U256::one());
        outcome.decided(Decision::BridgeOnly);
        assert!(outcome.advance(TokenState::ApprovalPending));
        assert!(outcome.advance(TokenState::ApprovalConfirmed));
        assert!(outcome.advance(TokenState::ActionPending));
        assert!(outcome.advance(TokenState::ActionConfirmed));
        assert!(outcome.state.is_terminal());
        assert!(outcome.passed_through(TokenState::ApprovalConfirmed));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut outcome = TokenOutcome::discovered(Chain::Base, Address::zero(), U256::one());
        outcome.decided(Decision::Noop);
        assert!(outcome.advance(TokenState::Skipped));
        assert!(!outcome.advance(TokenState::Failed));
        assert!(!outcome.advance(TokenState::ActionPending));
        assert_eq!(outcome.state, TokenState::Skipped);
    }

    #[test]
    fn test_action_cannot_skip_confirmation_of_approval() {
        let mut outcome = TokenOutcome::discovered(Chain::Base, Address::zero(), U256::one());
        outcome.decided(Decision::BridgeOnly);
        outcome.advance(TokenState::ApprovalPending);
        assert!(!outcome.advance(TokenState::ActionPending));
        outcome.fail(SweepError::UnsupportedChain(1));
        assert_eq!(outcome.state, TokenState::Failed);
        assert!(outcome.error.is_some());
    }
}
