use async_trait::async_trait;
use ethers::types::Address;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use super::BalanceSource;
use crate::chains::Chain;
use crate::error::SweepError;
use crate::types::TokenBalance;
use crate::utils::{parse_hex_u256, upstream_request_error, upstream_status_error};

const SERVICE: &str = "alchemy";

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<TokenBalancesResult>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResult {
    #[serde(default)]
    token_balances: Vec<RawTokenBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenBalance {
    contract_address: Address,
    token_balance: Option<String>,
}

/// Node-provider backend built on `alchemy_getTokenBalances`.
#[derive(Debug, Clone)]
pub struct AlchemyBalances {
    client: reqwest::Client,
    api_key: String,
}

impl AlchemyBalances {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, chain: Chain) -> Result<String, SweepError> {
        let network = chain
            .alchemy_network()
            .ok_or(SweepError::UnsupportedChain(chain.id()))?;
        Ok(format!("https://{}.g.alchemy.com/v2/{}", network, self.api_key))
    }
}

#[async_trait]
impl BalanceSource for AlchemyBalances {
    async fn fetch_balances(
        &self,
        account: Address,
        chain: Chain,
    ) -> Result<Vec<TokenBalance>, SweepError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "alchemy_getTokenBalances",
            "params": [account],
        });

        let response = self
            .client
            .post(self.endpoint(chain)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| upstream_request_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_status_error(SERVICE, status, &body));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| upstream_request_error(SERVICE, e))?;

        collect_positive(body, chain)
    }
}

fn collect_positive(body: RpcResponse, chain: Chain) -> Result<Vec<TokenBalance>, SweepError> {
    if let Some(err) = body.error {
        return Err(SweepError::UpstreamUnavailable {
            service: SERVICE,
            reason: format!("rpc error {}: {}", err.code, err.message),
        });
    }
    let result = body.result.ok_or_else(|| SweepError::UpstreamUnavailable {
        service: SERVICE,
        reason: "response carried neither result nor error".to_string(),
    })?;

    Ok(result
        .token_balances
        .into_iter()
        .filter_map(|raw| {
            let amount = raw.token_balance.as_deref().and_then(parse_hex_u256);
            match amount {
                Some(amount_raw) if !amount_raw.is_zero() => Some(TokenBalance {
                    contract_address: raw.contract_address,
                    amount_raw,
                    source_chain_id: chain.id(),
                }),
                Some(_) => None,
                None => {
                    debug!("Dropping unreadable balance for {:?}", raw.contract_address);
                    None
                }
            }
        })
        .collect())
}
