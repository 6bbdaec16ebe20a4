#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use mockall::mock;
use std::{collections::HashMap, sync::Arc};

use sweeper::{
    balances::BalanceSource,
    chains::Chain,
    engine::{EngineSettings, SweepEngine},
    error::SweepError,
    protocols::{AccountGateway, SwapQuoter},
    types::{
        AccountConfig, AllowanceRecord, ChainSelector, Confirmation, TokenBalance, TxKind,
        TxReceipt, TxStatus,
    },
};

mock! {
    pub Balances {}

    #[async_trait]
    impl BalanceSource for Balances {
        async fn fetch_balances(
            &self,
            account: Address,
            chain: Chain,
        ) -> Result<Vec<TokenBalance>, SweepError>;
    }
}

mock! {
    pub Quoter {}

    #[async_trait]
    impl SwapQuoter for Quoter {
        async fn quote_and_build_swap(
            &self,
            src: Address,
            dst: Address,
            amount: U256,
            from: Address,
            chain: Chain,
        ) -> Result<Bytes, SweepError>;
    }
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl AccountGateway for Gateway {
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
}

pub const ACCOUNT_A: Address = Address::repeat_byte(0x0a);
pub const ACCOUNT_B: Address = Address::repeat_byte(0x0b);
pub const TOKEN_X: Address = Address::repeat_byte(0xaa);

pub const APPROVE_HASH: H256 = H256::repeat_byte(0xa1);
pub const SWAP_HASH: H256 = H256::repeat_byte(0x5a);
pub const BRIDGE_HASH: H256 = H256::repeat_byte(0xb1);

pub fn usdc(chain: Chain) -> Address {
    sweeper::chains::tokens::address_on(sweeper::chains::tokens::Asset::Usdc, chain)
        .expect("usdc deployment")
}

pub fn preferring(token: Address, chain: Chain) -> AccountConfig {
    AccountConfig {
        preferred_token: token,
        preferred_chain_id: chain.id(),
        nonce: U256::zero(),
    }
}

pub fn holding(token: Address, amount: u64, chain: Chain) -> TokenBalance {
    TokenBalance {
        contract_address: token,
        amount_raw: U256::from(amount),
        source_chain_id: chain.id(),
    }
}

pub fn allowance(token: Address, owner: Address, spender: Address, amount: U256) -> AllowanceRecord {
    AllowanceRecord {
        token,
        owner,
        spender,
        amount_raw: amount,
    }
}

pub fn mined(hash: H256) -> Confirmation {
    Confirmation::Success(TxReceipt {
        hash,
        block_number: Some(1),
        gas_used: Some(U256::from(21_000)),
    })
}

pub fn reverted(hash: H256) -> Confirmation {
    Confirmation::Reverted(TxReceipt {
        hash,
        block_number: Some(1),
        gas_used: None,
    })
}

pub fn engine_with(
    balances: MockBalances,
    quoter: MockQuoter,
    gateways: Vec<(Chain, MockGateway)>,
) -> Arc<SweepEngine> {
    let gateways = gateways
        .into_iter()
        .map(|(chain, gateway)| (chain, Arc::new(gateway) as Arc<dyn AccountGateway>))
        .collect();
    engine_with_gateways(balances, quoter, gateways, EngineSettings::default())
}

pub fn engine_with_gateways(
    balances: MockBalances,
    quoter: MockQuoter,
    gateways: HashMap<Chain, Arc<dyn AccountGateway>>,
    settings: EngineSettings,
) -> Arc<SweepEngine> {
    Arc::new(SweepEngine::new(
        Arc::new(balances),
        Arc::new(quoter),
        gateways,
        settings,
    ))
}

/// Gateway whose node never answers.
pub struct UnresponsiveGateway;

#[async_trait]
impl AccountGateway for UnresponsiveGateway {
    async fn account_config(&self, _account: Address) -> Result<AccountConfig, SweepError> {
        std::future::pending().await
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<AllowanceRecord, SweepError> {
        std::future::pending().await
    }

    async fn submit_approval(
        &self,
        _account: Address,
        _token: Address,
        _spender: Address,
    ) -> Result<H256, SweepError> {
        std::future::pending().await
    }

    async fn submit_swap(&self, _account: Address, _calldata: Bytes) -> Result<H256, SweepError> {
        std::future::pending().await
    }

    async fn submit_bridge(
        &self,
        _account: Address,
        _selector: ChainSelector,
        _fee: U256,
    ) -> Result<H256, SweepError> {
        std::future::pending().await
    }

    async fn await_confirmation(
        &self,
        _tx_hash: H256,
        _kind: TxKind,
    ) -> Result<Confirmation, SweepError> {
        std::future::pending().await
    }

    async fn transaction_status(&self, _tx_hash: H256) -> Result<TxStatus, SweepError> {
        std::future::pending().await
    }

    async fn is_chain_allowlisted(
        &self,
        _account: Address,
        _selector: ChainSelector,
    ) -> Result<bool, SweepError> {
        std::future::pending().await
    }

    async fn cross_chain_fee(
        &self,
        _account: Address,
        _selector: ChainSelector,
        _token: Address,
        _amount: U256,
    ) -> Result<U256, SweepError> {
        std::future::pending().await
    }
}
