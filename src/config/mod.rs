use anyhow::{anyhow, bail, Context, Result};
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    str::FromStr,
    time::Duration,
};
use validator::{Validate, ValidationError};

use crate::chains::Chain;
use crate::engine::{EngineSettings, DEFAULT_ACCOUNT_TIMEOUT_SECS, DEFAULT_BRIDGE_FEE_WEI};
use crate::types::ManagedAccount;
use crate::utils::parse_level;

const RPC_URL_PREFIX: &str = "RPC_URL_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceBackend {
    Indexer,
    Alchemy,
}

impl FromStr for BalanceBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indexer" => Ok(BalanceBackend::Indexer),
            "alchemy" => Ok(BalanceBackend::Alchemy),
            other => Err(anyhow!("unknown BALANCE_BACKEND {:?}", other)),
        }
    }
}

/// Registry file entry: one smart account and the chains it is scanned on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountEntry {
    pub address: Address,
    pub chains: Vec<u64>,
}

#[derive(Debug, Clone, Validate)]
pub struct SweeperConfig {
    #[validate(custom = "validate_private_key")]
    pub private_key: String,
    pub rpc_urls: BTreeMap<u64, String>,
    pub accounts: Vec<AccountEntry>,

    pub balance_backend: BalanceBackend,
    #[validate(custom = "validate_http_url")]
    pub balances_api_url: String,
    pub balances_api_key: Option<String>,
    pub alchemy_api_key: Option<String>,

    #[validate(custom = "validate_http_url")]
    pub swap_api_url: String,
    #[validate(length(min = 1))]
    pub swap_api_key: String,
    #[validate(range(min = 0.01, max = 50.0))]
    pub swap_slippage: f64,

    pub bridge_fee_wei: U256,
    pub bridge_preflight: bool,

    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,
    #[validate(range(min = 1))]
    pub tx_timeout_secs: u64,
    #[validate(range(min = 1, max = 64))]
    pub tx_confirmations: u64,
    #[validate(range(min = 1))]
    pub http_timeout_secs: u64,
    #[validate(range(min = 1))]
    pub account_timeout_secs: u64,

    pub metrics_port: Option<u16>,
    #[validate(custom = "validate_log_level")]
    pub log_level: String,
}

impl SweeperConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let private_key = get("PRIVATE_KEY").context("PRIVATE_KEY is not set")?;

        let mut rpc_urls = BTreeMap::new();
        for (name, value) in vars {
            if let Some(suffix) = name.strip_prefix(RPC_URL_PREFIX) {
                let chain_id: u64 = suffix
                    .parse()
                    .with_context(|| format!("{} does not end in a chain id", name))?;
                rpc_urls.insert(chain_id, value.trim().to_string());
            }
        }

        let default_chains: Vec<u64> = match get("SCAN_CHAINS") {
            Some(raw) => parse_list(&raw, "SCAN_CHAINS")?,
            None => rpc_urls.keys().copied().collect(),
        };

        let mut accounts = Vec::new();
        if let Some(raw) = get("MANAGED_ACCOUNTS") {
            for address in parse_list::<Address>(&raw, "MANAGED_ACCOUNTS")? {
                accounts.push(AccountEntry {
                    address,
                    chains: default_chains.clone(),
                });
            }
        }
        if let Some(path) = get("MANAGED_ACCOUNTS_FILE") {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read accounts file {}", path))?;
            let entries: Vec<AccountEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse accounts file {}", path))?;
            accounts.extend(entries);
        }

        Ok(Self {
            private_key,
            rpc_urls,
            accounts,
            balance_backend: get("BALANCE_BACKEND")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(BalanceBackend::Indexer),
            balances_api_url: get("BALANCES_API_URL")
                .unwrap_or_else(|| "https://token-api.thegraph.com".to_string()),
            balances_api_key: get("BALANCES_API_KEY"),
            alchemy_api_key: get("ALCHEMY_API_KEY"),
            swap_api_url: get("SWAP_API_URL")
                .unwrap_or_else(|| "https://api.1inch.dev/swap/v6.0".to_string()),
            swap_api_key: get("SWAP_API_KEY").unwrap_or_default(),
            swap_slippage: parse_or(get("SWAP_SLIPPAGE"), "SWAP_SLIPPAGE", 2.0)?,
            bridge_fee_wei: match get("BRIDGE_FEE_WEI") {
                Some(raw) => U256::from_dec_str(&raw)
                    .map_err(|e| anyhow!("invalid BRIDGE_FEE_WEI {:?}: {}", raw, e))?,
                None => U256::from(DEFAULT_BRIDGE_FEE_WEI),
            },
            bridge_preflight: parse_or(get("BRIDGE_PREFLIGHT"), "BRIDGE_PREFLIGHT", true)?,
            sweep_interval_secs: parse_or(get("SWEEP_INTERVAL_SECS"), "SWEEP_INTERVAL_SECS", 20)?,
            tx_timeout_secs: parse_or(get("TX_TIMEOUT_SECS"), "TX_TIMEOUT_SECS", 180)?,
            tx_confirmations: parse_or(get("TX_CONFIRMATIONS"), "TX_CONFIRMATIONS", 1)?,
            http_timeout_secs: parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 15)?,
            account_timeout_secs: parse_or(
                get("ACCOUNT_TIMEOUT_SECS"),
                "ACCOUNT_TIMEOUT_SECS",
                DEFAULT_ACCOUNT_TIMEOUT_SECS,
            )?,
            metrics_port: get("METRICS_PORT")
                .map(|v| v.parse().with_context(|| format!("invalid METRICS_PORT {:?}", v)))
                .transpose()?,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn validate_all(&self) -> Result<()> {
        if let Err(e) = self.validate() {
            return Err(anyhow!("Configuration validation failed: {}", e));
        }

        self.validate_rpc_urls()?;
        self.validate_accounts()?;
        self.validate_backend_keys()?;

        if self.account_timeout_secs < self.tx_timeout_secs {
            bail!(
                "ACCOUNT_TIMEOUT_SECS ({}) must be at least TX_TIMEOUT_SECS ({})",
                self.account_timeout_secs,
                self.tx_timeout_secs
            );
        }

        Ok(())
    }

    fn validate_rpc_urls(&self) -> Result<()> {
        if self.rpc_urls.is_empty() {
            bail!("no RPC_URL_<chainId> variables are set");
        }
        for (chain_id, url) in &self.rpc_urls {
            if Chain::from_id(*chain_id).is_none() {
                bail!("RPC_URL_{}: chain {} is not supported", chain_id, chain_id);
            }
            validate_rpc_url(url)
                .map_err(|_| anyhow!("RPC_URL_{} is not an http(s) url", chain_id))?;
        }
        Ok(())
    }

    fn validate_accounts(&self) -> Result<()> {
        if self.accounts.is_empty() {
            bail!("no managed accounts: set MANAGED_ACCOUNTS or MANAGED_ACCOUNTS_FILE");
        }
        let mut seen = HashSet::new();
        for entry in &self.accounts {
            if entry.address.is_zero() {
                bail!("managed account list contains the zero address");
            }
            if !seen.insert(entry.address) {
                bail!("account {:?} is listed twice", entry.address);
            }
            if entry.chains.is_empty() {
                bail!("account {:?} scans no chains", entry.address);
            }
            for chain_id in &entry.chains {
                if Chain::from_id(*chain_id).is_none() {
                    bail!("account {:?}: chain {} is not supported", entry.address, chain_id);
                }
                if !self.rpc_urls.contains_key(chain_id) {
                    bail!(
                        "account {:?} scans chain {} but RPC_URL_{} is not set",
                        entry.address,
                        chain_id,
                        chain_id
                    );
                }
            }
        }
        Ok(())
    }

    fn validate_backend_keys(&self) -> Result<()> {
        match self.balance_backend {
            BalanceBackend::Indexer if self.balances_api_key.is_none() => {
                bail!("BALANCES_API_KEY is required for the indexer backend")
            }
            BalanceBackend::Alchemy if self.alchemy_api_key.is_none() => {
                bail!("ALCHEMY_API_KEY is required for the alchemy backend")
            }
            _ => Ok(()),
        }
    }

    pub fn managed_accounts(&self) -> Result<Vec<ManagedAccount>> {
        self.accounts
            .iter()
            .map(|entry| {
                let chains = entry
                    .chains
                    .iter()
                    .map(|id| Chain::try_from(*id))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ManagedAccount::new(entry.address, chains))
            })
            .collect()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            interval: Duration::from_secs(self.sweep_interval_secs),
            bridge_fee: self.bridge_fee_wei,
            bridge_preflight: self.bridge_preflight,
            account_timeout: Duration::from_secs(self.account_timeout_secs),
        }
    }

    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_list<T>(raw: &str, name: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<T>()
                .map_err(|e| anyhow!("invalid entry {:?} in {}: {}", item, name, e))
        })
        .collect()
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .parse()
            .map_err(|e| anyhow!("invalid {} {:?}: {}", name, value, e)),
        None => Ok(default),
    }
}

// Custom validators
fn validate_rpc_url(url: &str) -> Result<(), ValidationError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::new("invalid_rpc_url"));
    }
    validate_http_url(url).map_err(|_| ValidationError::new("invalid_rpc_url"))
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        _ => Err(ValidationError::new("invalid_http_url")),
    }
}

fn validate_private_key(key: &str) -> Result<(), ValidationError> {
    let digits = key.strip_prefix("0x").unwrap_or(key);
    if digits.len() != 64 || hex::decode(digits).is_err() {
        return Err(ValidationError::new("invalid_private_key"));
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if parse_level(level).is_none() {
        return Err(ValidationError::new("invalid_log_level"));
    }
    Ok(())
}
