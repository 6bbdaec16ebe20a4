mod common;

use anyhow::Result;
use ethers::types::{Bytes, U256};
use mockall::predicate::eq;
use std::{collections::HashMap, sync::Arc, time::Duration};

use common::*;
use sweeper::{
    chains::Chain,
    engine::{state::TokenState, EngineSettings},
    error::{ErrorClass, SweepError},
    protocols::AccountGateway,
    types::ManagedAccount,
};

/// Account B holds a foreign token on base and gets swapped.
fn expect_b_swapped(gateway: &mut MockGateway, quoter: &mut MockQuoter) {
    let preferred = usdc(Chain::Base);
    gateway
        .expect_account_config()
        .with(eq(ACCOUNT_B))
        .returning(move |_| Ok(preferring(preferred, Chain::Base)));
    gateway
        .expect_allowance()
        .returning(|t, o, s| Ok(allowance(t, o, s, U256::MAX)));
    gateway
        .expect_submit_swap()
        .with(eq(ACCOUNT_B), mockall::predicate::always())
        .times(1)
        .returning(|_, _| Ok(SWAP_HASH));
    gateway
        .expect_await_confirmation()
        .returning(|h, _| Ok(mined(h)));
    quoter
        .expect_quote_and_build_swap()
        .times(1)
        .returning(|_, _, _, _, _| Ok(Bytes::from(vec![0x01])));
}

#[test_log::test(tokio::test)]
async fn test_upstream_outage_for_one_account_does_not_block_another() -> Result<()> {
    let mut balances = MockBalances::new();
    balances
        .expect_fetch_balances()
        .with(eq(ACCOUNT_A), eq(Chain::Base))
        .returning(|_, _| {
            Err(SweepError::UpstreamUnavailable {
                service: "balances",
                reason: "status 503".to_string(),
            })
        });
    balances
        .expect_fetch_balances()
        .with(eq(ACCOUNT_B), eq(Chain::Base))
        .returning(|_, _| Ok(vec![holding(TOKEN_X, 500, Chain::Base)]));

    let mut gateway = MockGateway::new();
    let mut quoter = MockQuoter::new();
    gateway
        .expect_account_config()
        .with(eq(ACCOUNT_A))
        .returning(|_| Ok(preferring(usdc(Chain::Base), Chain::Base)));
    expect_b_swapped(&mut gateway, &mut quoter);

    let engine = engine_with(balances, quoter, vec![(Chain::Base, gateway)]);
    let report = engine
        .run_cycle(&[
            ManagedAccount::new(ACCOUNT_A, vec![Chain::Base]),
            ManagedAccount::new(ACCOUNT_B, vec![Chain::Base]),
        ])
        .await;

    let a = report.account(ACCOUNT_A).unwrap();
    assert!(a.tokens.is_empty());
    assert_eq!(a.chain_errors.len(), 1);
    assert_eq!(a.chain_errors[0].1.class(), ErrorClass::Transient);

    let b = report.account(ACCOUNT_B).unwrap();
    assert_eq!(b.count(TokenState::ActionConfirmed), 1);
    assert_eq!(report.aborted, 0);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_panicking_account_task_is_contained() -> Result<()> {
    let mut balances = MockBalances::new();
    balances
        .expect_fetch_balances()
        .with(eq(ACCOUNT_B), eq(Chain::Base))
        .returning(|_, _| Ok(vec![holding(TOKEN_X, 500, Chain::Base)]));

    // Account A lives on optimism, whose gateway blows up.
    let mut broken = MockGateway::new();
    broken
        .expect_account_config()
        .returning(|_| panic!("rpc client poisoned"));

    let mut gateway = MockGateway::new();
    let mut quoter = MockQuoter::new();
    expect_b_swapped(&mut gateway, &mut quoter);

    let engine = engine_with(
        balances,
        quoter,
        vec![(Chain::Optimism, broken), (Chain::Base, gateway)],
    );
    let report = engine
        .run_cycle(&[
            ManagedAccount::new(ACCOUNT_A, vec![Chain::Optimism]),
            ManagedAccount::new(ACCOUNT_B, vec![Chain::Base]),
        ])
        .await;

    assert_eq!(report.aborted, 1);
    assert!(report.account(ACCOUNT_A).is_none());
    let b = report.account(ACCOUNT_B).unwrap();
    assert_eq!(b.count(TokenState::ActionConfirmed), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_failed_token_does_not_stop_the_rest_of_the_batch() -> Result<()> {
    let preferred = usdc(Chain::Base);
    let other = ethers::types::Address::repeat_byte(0xbb);

    let mut balances = MockBalances::new();
    balances.expect_fetch_balances().returning(move |_, _| {
        Ok(vec![
            holding(TOKEN_X, 500, Chain::Base),
            holding(other, 900, Chain::Base),
        ])
    });

    let mut gateway = MockGateway::new();
    gateway
        .expect_account_config()
        .returning(move |_| Ok(preferring(preferred, Chain::Base)));
    gateway
        .expect_allowance()
        .returning(|t, o, s| Ok(allowance(t, o, s, U256::MAX)));
    gateway
        .expect_submit_swap()
        .times(1)
        .returning(|_, _| Ok(SWAP_HASH));
    gateway
        .expect_await_confirmation()
        .returning(|h, _| Ok(mined(h)));

    let mut quoter = MockQuoter::new();
    quoter
        .expect_quote_and_build_swap()
        .with(
            eq(TOKEN_X),
            eq(preferred),
            eq(U256::from(500)),
            eq(ACCOUNT_A),
            eq(Chain::Base),
        )
        .returning(|src, dst, _, _, chain| {
            Err(SweepError::NoRoute {
                src,
                dst,
                chain_id: chain.id(),
                reason: "insufficient liquidity".to_string(),
            })
        });
    quoter
        .expect_quote_and_build_swap()
        .with(
            eq(other),
            eq(preferred),
            eq(U256::from(900)),
            eq(ACCOUNT_A),
            eq(Chain::Base),
        )
        .returning(|_, _, _, _, _| Ok(Bytes::from(vec![0x02])));

    let engine = engine_with(balances, quoter, vec![(Chain::Base, gateway)]);
    let report = engine
        .run_cycle(&[ManagedAccount::new(ACCOUNT_A, vec![Chain::Base])])
        .await;

    let tokens = &report.account(ACCOUNT_A).unwrap().tokens;
    assert_eq!(tokens.len(), 2);
    // Processed in the order the balance source returned them.
    assert_eq!(tokens[0].token, TOKEN_X);
    assert_eq!(tokens[0].state, TokenState::Failed);
    assert_eq!(
        tokens[0].error.as_ref().map(|e| e.class()),
        Some(ErrorClass::Transient)
    );
    assert_eq!(tokens[1].token, other);
    assert_eq!(tokens[1].state, TokenState::ActionConfirmed);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unresponsive_node_cannot_stall_the_cycle() -> Result<()> {
    let mut balances = MockBalances::new();
    balances
        .expect_fetch_balances()
        .with(eq(ACCOUNT_B), eq(Chain::Base))
        .returning(|_, _| Ok(vec![holding(TOKEN_X, 500, Chain::Base)]));

    let mut gateway = MockGateway::new();
    let mut quoter = MockQuoter::new();
    expect_b_swapped(&mut gateway, &mut quoter);

    let mut gateways: HashMap<Chain, Arc<dyn AccountGateway>> = HashMap::new();
    gateways.insert(Chain::Optimism, Arc::new(UnresponsiveGateway));
    gateways.insert(Chain::Base, Arc::new(gateway));
    let settings = EngineSettings {
        account_timeout: Duration::from_millis(200),
        ..EngineSettings::default()
    };
    let engine = engine_with_gateways(balances, quoter, gateways, settings);

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run_cycle(&[
            ManagedAccount::new(ACCOUNT_A, vec![Chain::Optimism]),
            ManagedAccount::new(ACCOUNT_B, vec![Chain::Base]),
        ]),
    )
    .await?;

    let a = report.account(ACCOUNT_A).unwrap();
    assert!(matches!(a.error, Some(SweepError::AccountTimeout { .. })));
    assert_eq!(a.error.as_ref().map(|e| e.class()), Some(ErrorClass::Transient));
    assert!(a.tokens.is_empty());

    let b = report.account(ACCOUNT_B).unwrap();
    assert!(b.error.is_none());
    assert_eq!(b.count(TokenState::ActionConfirmed), 1);
    assert_eq!(report.aborted, 0);
    Ok(())
}
