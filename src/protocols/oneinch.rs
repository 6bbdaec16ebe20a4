use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use log::debug;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

#[cfg(test)]
use mockall::automock;

use crate::chains::Chain;
use crate::error::SweepError;
use crate::utils::{fmt_address, upstream_request_error, upstream_status_error};

const SERVICE: &str = "swap aggregator";

/// Builds swap calldata for the smart account's `executeSwap`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SwapQuoter: Send + Sync {
    async fn quote_and_build_swap(
        &self,
        src: Address,
        dst: Address,
        amount: U256,
        from: Address,
        chain: Chain,
    ) -> Result<Bytes, SweepError>;
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    tx: Option<SwapTx>,
}

#[derive(Debug, Deserialize)]
struct SwapTx {
    #[serde(default)]
    data: Option<Bytes>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Aggregator swap endpoint client (`{base}/{chainId}/swap`).
#[derive(Debug, Clone)]
pub struct OneInchClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    slippage: f64,
}

impl OneInchClient {
    pub fn new(client: reqwest::Client, base_url: Url, api_key: impl Into<String>, slippage: f64) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
            slippage,
        }
    }

    fn swap_url(
        &self,
        src: Address,
        dst: Address,
        amount: U256,
        from: Address,
        chain: Chain,
    ) -> Result<Url, SweepError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SweepError::UpstreamUnavailable {
                service: SERVICE,
                reason: format!("base url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend([chain.id().to_string().as_str(), "swap"]);
        url.query_pairs_mut()
            .append_pair("src", &fmt_address(src))
            .append_pair("dst", &fmt_address(dst))
            .append_pair("amount", &amount.to_string())
            .append_pair("from", &fmt_address(from))
            .append_pair("slippage", &self.slippage.to_string())
            .append_pair("disableEstimate", "false")
            .append_pair("allowPartialFill", "false");
        Ok(url)
    }
}

#[async_trait]
impl SwapQuoter for OneInchClient {
    async fn quote_and_build_swap(
        &self,
        src: Address,
        dst: Address,
        amount: U256,
        from: Address,
        chain: Chain,
    ) -> Result<Bytes, SweepError> {
        let url = self.swap_url(src, dst, amount, from, chain)?;
        debug!("Requesting swap route {:?} -> {:?} ({}) on {}", src, dst, amount, chain);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| upstream_request_error(SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(SweepError::NoRoute {
                src,
                dst,
                chain_id: chain.id(),
                reason: describe_error(&body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_status_error(SERVICE, status, &body));
        }

        let body: SwapResponse = response
            .json()
            .await
            .map_err(|e| upstream_request_error(SERVICE, e))?;

        extract_calldata(body).ok_or_else(|| SweepError::NoRoute {
            src,
            dst,
            chain_id: chain.id(),
            reason: "response carried no tx.data".to_string(),
        })
    }
}

fn extract_calldata(body: SwapResponse) -> Option<Bytes> {
    body.tx
        .and_then(|tx| tx.data)
        .filter(|data| !data.is_empty())
}

fn describe_error(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            description: Some(description),
            ..
        }) => description,
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ => body.chars().take(200).collect(),
    }
}
