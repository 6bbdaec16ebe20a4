use ethers::types::{Address, H256, U256};
use log::{debug, info};

use crate::error::SweepError;
use crate::metrics;
use crate::protocols::AccountGateway;
use crate::types::{Confirmation, TxKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceOutcome {
    /// Existing allowance already covered the amount; nothing was sent.
    AlreadySufficient,
    /// An approval was sent and confirmed.
    Approved(H256),
}

/// Makes sure `spender` may pull `required` of `token` from `owner`.
///
/// The allowance is always read from chain. An approval is submitted only
/// when it falls short, and this call does not return until that approval is
/// confirmed, reverted or timed out.
pub async fn ensure_allowance(
    gateway: &dyn AccountGateway,
    token: Address,
    owner: Address,
    spender: Address,
    required: U256,
) -> Result<AllowanceOutcome, SweepError> {
    let current = gateway.allowance(token, owner, spender).await?;
    if current.covers(required) {
        debug!(
            "Allowance of {:?} for {:?} is {} (need {}), no approval needed",
            token, spender, current.amount_raw, required
        );
        return Ok(AllowanceOutcome::AlreadySufficient);
    }

    info!(
        "Approving {:?} for {:?} on account {:?} (have {}, need {})",
        token, spender, owner, current.amount_raw, required
    );
    let tx_hash = gateway.submit_approval(owner, token, spender).await?;
    metrics::record_tx_submitted(TxKind::Approve);

    let failed = |reason: String| SweepError::ApprovalFailed {
        token,
        spender,
        tx_hash: Some(tx_hash),
        reason,
    };

    match gateway.await_confirmation(tx_hash, TxKind::Approve).await {
        Ok(Confirmation::Success(_)) => {
            metrics::record_tx_confirmed(TxKind::Approve);
            info!("Approval {:?} confirmed", tx_hash);
            Ok(AllowanceOutcome::Approved(tx_hash))
        }
        Ok(Confirmation::Reverted(_)) => Err(failed("approval reverted".to_string())),
        Err(SweepError::ConfirmationTimeout { waited, .. }) => Err(failed(format!(
            "not confirmed within {:?}",
            waited
        ))),
        Err(e) => Err(failed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::account::MockAccountGateway;
    use crate::types::{AllowanceRecord, TxReceipt};
    use std::time::Duration;

    const TOKEN: Address = Address::repeat_byte(0xaa);
    const OWNER: Address = Address::repeat_byte(0x0a);
    const SPENDER: Address = Address::repeat_byte(0x11);

    fn allowance_of(amount: u64) -> AllowanceRecord {
        AllowanceRecord {
            token: TOKEN,
            owner: OWNER,
            spender: SPENDER,
            amount_raw: U256::from(amount),
        }
    }

    fn receipt(hash: H256) -> TxReceipt {
        TxReceipt {
            hash,
            block_number: Some(1),
            gas_used: None,
        }
    }

    #[tokio::test]
    async fn test_sufficient_allowance_sends_nothing() {
        let mut gateway = MockAccountGateway::new();
        gateway
            .expect_allowance()
            .times(1)
            .returning(|_, _, _| Ok(allowance_of(500)));
        gateway.expect_submit_approval().never();
        gateway.expect_await_confirmation().never();

        let outcome = ensure_allowance(&gateway, TOKEN, OWNER, SPENDER, U256::from(500))
            .await
            .unwrap();
        assert_eq!(outcome, AllowanceOutcome::AlreadySufficient);
    }

    #[tokio::test]
    async fn test_short_allowance_is_approved_and_awaited() {
        let hash = H256::repeat_byte(0x01);
        let mut gateway = MockAccountGateway::new();
        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(allowance_of(10)));
        gateway
            .expect_submit_approval()
            .withf(|owner, token, spender| *owner == OWNER && *token == TOKEN && *spender == SPENDER)
            .times(1)
            .returning(move |_, _, _| Ok(hash));
        gateway
            .expect_await_confirmation()
            .withf(move |h, kind| *h == hash && *kind == TxKind::Approve)
            .times(1)
            .returning(move |h, _| Ok(Confirmation::Success(receipt(h))));

        let outcome = ensure_allowance(&gateway, TOKEN, OWNER, SPENDER, U256::from(500))
            .await
            .unwrap();
        assert_eq!(outcome, AllowanceOutcome::Approved(hash));
    }

    #[tokio::test]
    async fn test_reverted_or_stalled_approval_fails() {
        let hash = H256::repeat_byte(0x02);
        let mut gateway = MockAccountGateway::new();
        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(allowance_of(0)));
        gateway
            .expect_submit_approval()
            .returning(move |_, _, _| Ok(hash));
        gateway
            .expect_await_confirmation()
            .times(1)
            .returning(move |h, _| Ok(Confirmation::Reverted(receipt(h))));

        let err = ensure_allowance(&gateway, TOKEN, OWNER, SPENDER, U256::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::ApprovalFailed { tx_hash: Some(h), .. } if h == hash));

        let mut gateway = MockAccountGateway::new();
        gateway
            .expect_allowance()
            .returning(|_, _, _| Ok(allowance_of(0)));
        gateway
            .expect_submit_approval()
            .returning(move |_, _, _| Ok(hash));
        gateway.expect_await_confirmation().returning(|h, kind| {
            Err(SweepError::ConfirmationTimeout {
                kind,
                tx_hash: h,
                waited: Duration::from_secs(180),
            })
        });

        let err = ensure_allowance(&gateway, TOKEN, OWNER, SPENDER, U256::from(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::ApprovalFailed { .. }));
        assert_eq!(err.class(), crate::error::ErrorClass::Transactional);
    }
}
