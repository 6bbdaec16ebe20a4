use anyhow::{Context, Result};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Provider},
    signers::{LocalWallet, Signer},
};
use log::{error, info, LevelFilter};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::watch;
use url::Url;

use sweeper::{
    balances::{AlchemyBalances, BalanceSource, TokenApiBalances},
    chains::Chain,
    config::{BalanceBackend, SweeperConfig},
    engine::SweepEngine,
    metrics,
    protocols::{AccountGateway, EthersGateway, OneInchClient, SwapQuoter},
    utils::{parse_level, setup_logger},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load and validate configuration before anything touches the network
    let config = SweeperConfig::from_env()?;
    config.validate_all()?;

    setup_logger(parse_level(&config.log_level).unwrap_or(LevelFilter::Info))?;

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
    }

    let wallet: LocalWallet = config
        .private_key
        .trim_start_matches("0x")
        .parse()
        .context("invalid PRIVATE_KEY")?;
    info!("Signing as {:?}", wallet.address());

    // Shared by the RPC providers and the external APIs; bounds every request
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()
        .context("failed to build http client")?;

    let gateways = build_gateways(&config, &wallet, &http)?;

    let balances: Arc<dyn BalanceSource> = match config.balance_backend {
        BalanceBackend::Indexer => Arc::new(TokenApiBalances::new(
            http.clone(),
            Url::parse(&config.balances_api_url)?,
            config.balances_api_key.clone().unwrap_or_default(),
        )),
        BalanceBackend::Alchemy => Arc::new(AlchemyBalances::new(
            http.clone(),
            config.alchemy_api_key.clone().unwrap_or_default(),
        )),
    };

    let quoter: Arc<dyn SwapQuoter> = Arc::new(OneInchClient::new(
        http,
        Url::parse(&config.swap_api_url)?,
        config.swap_api_key.clone(),
        config.swap_slippage,
    ));

    let accounts = config.managed_accounts()?;
    let engine = Arc::new(SweepEngine::new(
        balances,
        quoter,
        gateways,
        config.engine_settings(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(engine.run(accounts, shutdown_rx));

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, finishing current cycle"),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = handle.await {
        error!("Sweep loop task failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn build_gateways(
    config: &SweeperConfig,
    wallet: &LocalWallet,
    http: &reqwest::Client,
) -> Result<HashMap<Chain, Arc<dyn AccountGateway>>> {
    let mut gateways: HashMap<Chain, Arc<dyn AccountGateway>> = HashMap::new();

    for (chain_id, rpc_url) in &config.rpc_urls {
        let chain = Chain::try_from(*chain_id)?;
        let url = Url::parse(rpc_url)
            .with_context(|| format!("cannot initialise provider for {}", chain))?;
        let provider = Provider::new(Http::new_with_client(url, http.clone()));
        let client = Arc::new(SignerMiddleware::new(
            provider,
            wallet.clone().with_chain_id(*chain_id),
        ));
        gateways.insert(
            chain,
            Arc::new(EthersGateway::new(
                chain,
                client,
                config.tx_timeout(),
                config.tx_confirmations,
            )),
        );
        info!("Provider ready for {}", chain);
    }

    Ok(gateways)
}
