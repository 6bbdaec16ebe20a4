use async_trait::async_trait;
use ethers::types::{Address, U256};
use log::debug;
use serde::Deserialize;
use url::Url;

#[cfg(test)]
use mockall::automock;

use crate::chains::Chain;
use crate::error::SweepError;
use crate::types::TokenBalance;
use crate::utils::{fmt_address, upstream_request_error, upstream_status_error};

pub mod alchemy;

pub use alchemy::AlchemyBalances;

const SERVICE: &str = "balances";

/// Where the engine learns what an account holds.
///
/// Implementations return raw holdings in the order the backend reports them.
/// Zero amounts and native-coin placeholders may be included; the engine
/// filters them before deciding anything.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balances(
        &self,
        account: Address,
        chain: Chain,
    ) -> Result<Vec<TokenBalance>, SweepError>;
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    data: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    contract: String,
    amount: String,
}

/// Balances-indexing REST API (`/balances/evm/{address}?network_id=..`).
#[derive(Debug, Clone)]
pub struct TokenApiBalances {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl TokenApiBalances {
    pub fn new(client: reqwest::Client, base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, account: Address, network: &str) -> Result<Url, SweepError> {
        let account = fmt_address(account);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SweepError::UpstreamUnavailable {
                service: SERVICE,
                reason: format!("base url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["balances", "evm", account.as_str()]);
        url.query_pairs_mut().append_pair("network_id", network);
        Ok(url)
    }
}

#[async_trait]
impl BalanceSource for TokenApiBalances {
    async fn fetch_balances(
        &self,
        account: Address,
        chain: Chain,
    ) -> Result<Vec<TokenBalance>, SweepError> {
        let network = chain
            .indexer_network()
            .ok_or(SweepError::UnsupportedChain(chain.id()))?;
        let url = self.endpoint(account, network)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| upstream_request_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_status_error(SERVICE, status, &body));
        }

        let body: BalancesResponse = response
            .json()
            .await
            .map_err(|e| upstream_request_error(SERVICE, e))?;

        Ok(parse_entries(body.data, chain))
    }
}

fn parse_entries(entries: Vec<BalanceEntry>, chain: Chain) -> Vec<TokenBalance> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let contract_address = match entry.contract.parse::<Address>() {
                Ok(address) => address,
                Err(_) => {
                    debug!("Skipping balance with unparseable contract {}", entry.contract);
                    return None;
                }
            };
            let amount_raw = match U256::from_dec_str(entry.amount.trim()) {
                Ok(amount) => amount,
                Err(_) => {
                    debug!(
                        "Skipping balance of {} with unparseable amount {}",
                        entry.contract, entry.amount
                    );
                    return None;
                }
            };
            Some(TokenBalance {
                contract_address,
                amount_raw,
                source_chain_id: chain.id(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indexer_response() {
        let raw = r#"{
            "data": [
                {"contract": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", "amount": "1000", "symbol": "USDC"},
                {"contract": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee", "amount": "42"},
                {"contract": "not-an-address", "amount": "1"},
                {"contract": "0x4200000000000000000000000000000000000006", "amount": "1.5"}
            ]
        }"#;
        let body: BalancesResponse = serde_json::from_str(raw).unwrap();
        let balances = parse_entries(body.data, Chain::Base);

        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].amount_raw, U256::from(1000));
        assert_eq!(balances[0].source_chain_id, 8453);
        assert!(!balances[1].is_sweepable());
    }

    #[test]
    fn test_endpoint_layout() {
        let source = TokenApiBalances::new(
            reqwest::Client::new(),
            Url::parse("https://token-api.thegraph.com/").unwrap(),
            "key",
        );
        let url = source
            .endpoint(Address::repeat_byte(0x11), "base")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://token-api.thegraph.com/balances/evm/0x1111111111111111111111111111111111111111?network_id=base"
        );
    }

    #[tokio::test]
    async fn test_testnets_are_not_indexed() {
        let source = TokenApiBalances::new(
            reqwest::Client::new(),
            Url::parse("https://token-api.thegraph.com").unwrap(),
            "key",
        );
        let result = source
            .fetch_balances(Address::repeat_byte(0x11), Chain::BaseSepolia)
            .await;
        assert!(matches!(result, Err(SweepError::UnsupportedChain(84532))));
    }
}
