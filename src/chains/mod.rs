use ethers::types::Address;
use lazy_static::lazy_static;
use std::{collections::HashMap, fmt};

use crate::error::SweepError;
use crate::types::ChainSelector;

pub mod tokens;

/// Chains the sweeper knows how to route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chain {
    Ethereum,
    Sepolia,
    Polygon,
    PolygonAmoy,
    Bsc,
    BscTestnet,
    Avalanche,
    AvalancheFuji,
    Arbitrum,
    ArbitrumSepolia,
    Optimism,
    OptimismSepolia,
    Base,
    BaseSepolia,
}

impl Chain {
    pub const ALL: [Chain; 14] = [
        Chain::Ethereum,
        Chain::Sepolia,
        Chain::Polygon,
        Chain::PolygonAmoy,
        Chain::Bsc,
        Chain::BscTestnet,
        Chain::Avalanche,
        Chain::AvalancheFuji,
        Chain::Arbitrum,
        Chain::ArbitrumSepolia,
        Chain::Optimism,
        Chain::OptimismSepolia,
        Chain::Base,
        Chain::BaseSepolia,
    ];

    pub const fn id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Sepolia => 11155111,
            Chain::Polygon => 137,
            Chain::PolygonAmoy => 80002,
            Chain::Bsc => 56,
            Chain::BscTestnet => 97,
            Chain::Avalanche => 43114,
            Chain::AvalancheFuji => 43113,
            Chain::Arbitrum => 42161,
            Chain::ArbitrumSepolia => 421614,
            Chain::Optimism => 10,
            Chain::OptimismSepolia => 11155420,
            Chain::Base => 8453,
            Chain::BaseSepolia => 84532,
        }
    }

    pub fn from_id(chain_id: u64) -> Option<Chain> {
        Chain::ALL.iter().copied().find(|chain| chain.id() == chain_id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Sepolia => "sepolia",
            Chain::Polygon => "polygon",
            Chain::PolygonAmoy => "polygon-amoy",
            Chain::Bsc => "bsc",
            Chain::BscTestnet => "bsc-testnet",
            Chain::Avalanche => "avalanche",
            Chain::AvalancheFuji => "avalanche-fuji",
            Chain::Arbitrum => "arbitrum",
            Chain::ArbitrumSepolia => "arbitrum-sepolia",
            Chain::Optimism => "optimism",
            Chain::OptimismSepolia => "optimism-sepolia",
            Chain::Base => "base",
            Chain::BaseSepolia => "base-sepolia",
        }
    }

    /// Network id understood by the balances indexer, if it covers this chain.
    pub fn indexer_network(&self) -> Option<&'static str> {
        CHAIN_SPECS.get(self).and_then(|spec| spec.indexer_network)
    }

    /// Network slug of the node provider's hosted endpoints.
    pub fn alchemy_network(&self) -> Option<&'static str> {
        CHAIN_SPECS.get(self).map(|spec| spec.alchemy_network)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}

impl TryFrom<u64> for Chain {
    type Error = SweepError;

    fn try_from(chain_id: u64) -> Result<Self, Self::Error> {
        Chain::from_id(chain_id).ok_or(SweepError::UnsupportedChain(chain_id))
    }
}

#[derive(Debug, Clone)]
pub struct ChainSpec {
    pub ccip_router: Address,
    pub ccip_selector: ChainSelector,
    pub swap_router: Address,
    pub indexer_network: Option<&'static str>,
    pub alchemy_network: &'static str,
}

const ONE_INCH_ROUTER: &str = "0x111111125421ca6dc452d289314280a0f8842a65";

fn spec(
    ccip_router: &str,
    selector: u64,
    indexer_network: Option<&'static str>,
    alchemy_network: &'static str,
) -> ChainSpec {
    ChainSpec {
        ccip_router: ccip_router.parse().unwrap(),
        ccip_selector: ChainSelector(selector),
        swap_router: ONE_INCH_ROUTER.parse().unwrap(),
        indexer_network,
        alchemy_network,
    }
}

lazy_static! {
    pub static ref CHAIN_SPECS: HashMap<Chain, ChainSpec> = {
        let mut m = HashMap::new();
        m.insert(
            Chain::Ethereum,
            spec("0x80226fc0ee2b096224eeac085bb9a8cba1146f7d", 5009297550715157269, Some("mainnet"), "eth-mainnet"),
        );
        m.insert(
            Chain::Sepolia,
            spec("0x0bf3de8c5d3e8a2b34d2beeb17abfcebaf363a59", 16015286601757825753, None, "eth-sepolia"),
        );
        m.insert(
            Chain::Polygon,
            spec("0x3c3d92629a02a8d95d5cb9650fe49c3544f69b43", 4051577828743386545, Some("matic"), "polygon-mainnet"),
        );
        m.insert(
            Chain::PolygonAmoy,
            spec("0x9c32fce489cf0fbf23e4f4283bd0b0a87e5f3e6b", 16281711391670634445, None, "polygon-amoy"),
        );
        m.insert(
            Chain::Bsc,
            spec("0x34b03cb9086d7d758ac55af71584f81a598759fd", 11344663589394136015, Some("bsc"), "bnb-mainnet"),
        );
        m.insert(
            Chain::BscTestnet,
            spec("0xe1053ae1857476f36a3c62580ff9b016e8ee8f6f", 13264668187771770619, None, "bnb-testnet"),
        );
        m.insert(
            Chain::Avalanche,
            spec("0xf4c7e640edA248ef95972845a62bdC74237805dB", 6433500567565415381, Some("avalanche"), "avax-mainnet"),
        );
        m.insert(
            Chain::AvalancheFuji,
            spec("0xf694e193200268f9a4868e4aa017a0118c9a8177", 14767482510784806043, None, "avax-fuji"),
        );
        m.insert(
            Chain::Arbitrum,
            spec("0x141fa059441e0ca23ce184b6a78bafe2a7b70977", 4949039107694359620, Some("arbitrum-one"), "arb-mainnet"),
        );
        m.insert(
            Chain::ArbitrumSepolia,
            spec("0x2a9c5afb0d0e4bab2bcdae109ec4b0c4be15a165", 3478487238524512106, None, "arb-sepolia"),
        );
        m.insert(
            Chain::Optimism,
            spec("0x3206695caea682fee4e7129862c6c3dab2c1192b", 3734403246176062136, Some("optimism"), "opt-mainnet"),
        );
        m.insert(
            Chain::OptimismSepolia,
            spec("0x114a20a10b43d4115e5aeef7345a1a71d2a60c57", 5224473277236331295, None, "opt-sepolia"),
        );
        m.insert(
            Chain::Base,
            spec("0x673aa85efd75080031d44fce061575d1da427a28", 15971525489660198786, Some("base"), "base-mainnet"),
        );
        m.insert(
            Chain::BaseSepolia,
            spec("0xd3b06ca5c1eadf11c1ccaaa648c0c93b8e8ed2cd", 10344971235874465080, None, "base-sepolia"),
        );
        m
    };
}

pub fn get_chain_spec(chain: Chain) -> Result<&'static ChainSpec, SweepError> {
    CHAIN_SPECS
        .get(&chain)
        .ok_or(SweepError::UnsupportedChain(chain.id()))
}

/// Maps a destination chain id to the messaging router's selector.
pub fn resolve_chain_selector(destination_chain_id: u64) -> Result<ChainSelector, SweepError> {
    let chain = Chain::try_from(destination_chain_id)?;
    Ok(get_chain_spec(chain)?.ccip_selector)
}

/// Spender the smart account must approve before a bridge on `chain`.
pub fn ccip_router(chain: Chain) -> Result<Address, SweepError> {
    Ok(get_chain_spec(chain)?.ccip_router)
}

/// Spender the smart account must approve before an aggregator swap on `chain`.
pub fn swap_router(chain: Chain) -> Result<Address, SweepError> {
    Ok(get_chain_spec(chain)?.swap_router)
}
