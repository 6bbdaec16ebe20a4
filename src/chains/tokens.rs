//! Same-asset deployments across chains.
//!
//! A bridge moves the preferred token from the chain it sits on to the
//! account's preferred chain. The account's on-chain config names the token by
//! its address on the source chain, so the destination address has to come
//! from this table.

use ethers::types::Address;
use lazy_static::lazy_static;
use std::collections::HashMap;

use super::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Usdc,
    Link,
}

lazy_static! {
    static ref DEPLOYMENTS: HashMap<Asset, Vec<(Chain, Address)>> = {
        let mut m = HashMap::new();
        m.insert(
            Asset::Usdc,
            vec![
                (Chain::Ethereum, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".parse().unwrap()),
                (Chain::Polygon, "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359".parse().unwrap()),
                (Chain::Arbitrum, "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".parse().unwrap()),
                (Chain::Optimism, "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85".parse().unwrap()),
                (Chain::Base, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap()),
                (Chain::Avalanche, "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E".parse().unwrap()),
                (Chain::Bsc, "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d".parse().unwrap()),
                (Chain::Sepolia, "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".parse().unwrap()),
                (Chain::BaseSepolia, "0x036CbD53842c5426634e7929541eC2318f3dCF7e".parse().unwrap()),
                (Chain::ArbitrumSepolia, "0x75faf114eafb1BDbe2F0316DF893fd58CE46AA4d".parse().unwrap()),
                (Chain::OptimismSepolia, "0x5fd84259d66Cd46123540766Be93DFE6D43130D7".parse().unwrap()),
                (Chain::PolygonAmoy, "0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582".parse().unwrap()),
                (Chain::AvalancheFuji, "0x5425890298aed601595a70AB815c96711a31Bc65".parse().unwrap()),
            ],
        );
        m.insert(
            Asset::Link,
            vec![
                (Chain::Ethereum, "0x514910771AF9Ca656af840dff83E8264EcF986CA".parse().unwrap()),
                (Chain::Base, "0x88Fb150BDc53A65fe94Dea0c9BA0a6dAf8C6e196".parse().unwrap()),
                (Chain::Arbitrum, "0xf97f4df75117a78c1A5a0DBb814Af92458539FB4".parse().unwrap()),
                (Chain::Optimism, "0x350a791Bfc2C21F9Ed5d10980Dad2e2638ffa7f6".parse().unwrap()),
                (Chain::Polygon, "0xb0897686c545045aFc77CF20eC7A532E3120E0F1".parse().unwrap()),
                (Chain::Bsc, "0x404460C6A5EdE2D891e8297795264fDe62ADBB75".parse().unwrap()),
                (Chain::Avalanche, "0x5947BB275c521040051D82396192181b413227A3".parse().unwrap()),
            ],
        );
        m
    };
}

/// Which known asset `token` is on `chain`, if any.
pub fn identify(token: Address, chain: Chain) -> Option<Asset> {
    DEPLOYMENTS.iter().find_map(|(asset, deployments)| {
        deployments
            .iter()
            .any(|(c, address)| *c == chain && *address == token)
            .then_some(*asset)
    })
}

pub fn address_on(asset: Asset, chain: Chain) -> Option<Address> {
    DEPLOYMENTS
        .get(&asset)?
        .iter()
        .find(|(c, _)| *c == chain)
        .map(|(_, address)| *address)
}

/// Address of `token` (as deployed on `from_chain`) on `to_chain`.
pub fn resolve_on_chain(token: Address, from_chain: Chain, to_chain: Chain) -> Option<Address> {
    if from_chain == to_chain {
        return Some(token);
    }
    address_on(identify(token, from_chain)?, to_chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usdc_resolves_across_mainnets() {
        let base_usdc: Address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".parse().unwrap();
        let arb_usdc: Address = "0xaf88d065e77c8cC2239327C5EDb3A432268e5831".parse().unwrap();
        assert_eq!(
            resolve_on_chain(base_usdc, Chain::Base, Chain::Arbitrum),
            Some(arb_usdc)
        );
        assert_eq!(
            resolve_on_chain(arb_usdc, Chain::Arbitrum, Chain::Base),
            Some(base_usdc)
        );
    }

    #[test]
    fn test_unknown_token_does_not_resolve() {
        let token = Address::repeat_byte(0x42);
        assert_eq!(resolve_on_chain(token, Chain::Base, Chain::Optimism), None);
        assert_eq!(resolve_on_chain(token, Chain::Base, Chain::Base), Some(token));
    }

    #[test]
    fn test_link_has_no_testnet_deployment() {
        let link = address_on(Asset::Link, Chain::Ethereum).unwrap();
        assert_eq!(resolve_on_chain(link, Chain::Ethereum, Chain::Sepolia), None);
    }

    #[test]
    fn test_table_has_no_duplicate_chain_per_asset() {
        for (asset, deployments) in DEPLOYMENTS.iter() {
            let mut chains: Vec<_> = deployments.iter().map(|(c, _)| *c).collect();
            chains.sort();
            chains.dedup();
            assert_eq!(chains.len(), deployments.len(), "{asset:?}");
            for (chain, address) in deployments {
                assert_eq!(identify(*address, *chain), Some(*asset));
            }
        }
    }
}
