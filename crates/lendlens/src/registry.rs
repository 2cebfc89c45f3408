//! Static protocol/chain configuration: which protocol is deployed where,
//! with which contract/program addresses, and which assets each market lists.
//!
//! Populated once at startup and read-only afterwards, so concurrent readers
//! need no synchronization.

use crate::errors::LendingError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Solana,
}

impl Chain {
    pub const ALL: &'static [Self] = &[Self::Ethereum, Self::Solana];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LendingError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" => Ok(Self::Ethereum),
            "solana" => Ok(Self::Solana),
            other => Err(LendingError::InvalidChain(other.to_owned())),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Aave,
    Solend,
}

impl Protocol {
    pub const ALL: &'static [Self] = &[Self::Aave, Self::Solend];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aave => "aave",
            Self::Solend => "solend",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LendingError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aave" => Ok(Self::Aave),
            "solend" => Ok(Self::Solend),
            other => Err(LendingError::InvalidProtocol(other.to_owned())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fungible token listed by a protocol on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Token contract address (EVM) or mint address (Solana).
    pub address: &'static str,
    pub decimals: u32,
}

/// Contract addresses an EVM-pool protocol exposes on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmPoolAddresses {
    pub pool: &'static str,
    pub data_provider: &'static str,
    pub oracle: &'static str,
}

/// Program + market addresses for an account-model protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountModelAddresses {
    pub program_id: &'static str,
    pub main_market: &'static str,
    /// symbol -> reserve account address
    pub reserves: &'static [(&'static str, &'static str)],
}

// Aave V3 Ethereum mainnet.
const AAVE_ETHEREUM: EvmPoolAddresses = EvmPoolAddresses {
    pool: "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2",
    data_provider: "0x7B4EB56E7CD4b454BA8ff71E4518426369a138a3",
    oracle: "0x54586bE62E3c3580375aE3723C145253060Ca0C2",
};

const AAVE_ETHEREUM_ASSETS: &[AssetConfig] = &[
    AssetConfig {
        symbol: "ETH",
        name: "Ethereum",
        // WETH
        address: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        decimals: 18,
    },
    AssetConfig {
        symbol: "USDC",
        name: "USD Coin",
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        decimals: 6,
    },
    AssetConfig {
        symbol: "USDT",
        name: "Tether USD",
        address: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        decimals: 6,
    },
    AssetConfig {
        symbol: "DAI",
        name: "Dai Stablecoin",
        address: "0x6B175474E89094C44Da98b954EedeAC495271d0F",
        decimals: 18,
    },
    AssetConfig {
        symbol: "WBTC",
        name: "Wrapped Bitcoin",
        address: "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599",
        decimals: 8,
    },
];

// Solend main pool, Solana mainnet.
const SOLEND: AccountModelAddresses = AccountModelAddresses {
    program_id: "So1endDq2YkqhipRh3WViPa8hdiSpxWy6z3Z6tMCpAo",
    main_market: "4UpD2fh7xH3VP9QQaXtsS1YY3bxzWhtfpks7FatyKvdY",
    reserves: &[
        ("SOL", "8PbodeaosQP19SjYFx855UMqWxH2HynZLdBXmsrbac36"),
        ("USDC", "BgxfHJDzm44T7XG68MYKx7YisTjZu73tVovyZSjJMpmw"),
        ("USDT", "8K9WC8xoh2rtQNY7iEGXtPvfbDCi563SdWhCAhuMP2xE"),
    ],
};

const SOLEND_ASSETS: &[AssetConfig] = &[
    AssetConfig {
        symbol: "SOL",
        name: "Solana",
        // Wrapped SOL
        address: "So11111111111111111111111111111111111111112",
        decimals: 9,
    },
    AssetConfig {
        symbol: "USDC",
        name: "USD Coin",
        address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        decimals: 6,
    },
    AssetConfig {
        symbol: "USDT",
        name: "Tether USD",
        address: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        decimals: 6,
    },
];

/// Read-only lookup over the deployment matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registry;

impl Registry {
    pub const fn new() -> Self {
        Self
    }

    pub fn is_supported(&self, protocol: Protocol, chain: Chain) -> bool {
        match (protocol, chain) {
            (Protocol::Aave, Chain::Ethereum) | (Protocol::Solend, Chain::Solana) => true,
            (Protocol::Aave, Chain::Solana) | (Protocol::Solend, Chain::Ethereum) => false,
        }
    }

    pub fn assets_for(&self, protocol: Protocol, chain: Chain) -> &'static [AssetConfig] {
        match (protocol, chain) {
            (Protocol::Aave, Chain::Ethereum) => AAVE_ETHEREUM_ASSETS,
            (Protocol::Solend, Chain::Solana) => SOLEND_ASSETS,
            _ => &[],
        }
    }

    pub fn evm_pool_addresses(
        &self,
        protocol: Protocol,
        chain: Chain,
    ) -> Option<&'static EvmPoolAddresses> {
        match (protocol, chain) {
            (Protocol::Aave, Chain::Ethereum) => Some(&AAVE_ETHEREUM),
            _ => None,
        }
    }

    pub fn account_model_addresses(
        &self,
        protocol: Protocol,
        chain: Chain,
    ) -> Option<&'static AccountModelAddresses> {
        match (protocol, chain) {
            (Protocol::Solend, Chain::Solana) => Some(&SOLEND),
            _ => None,
        }
    }

    /// Case-insensitive symbol lookup within one market's asset list.
    pub fn find_asset(
        &self,
        symbol: &str,
        protocol: Protocol,
        chain: Chain,
    ) -> Option<&'static AssetConfig> {
        self.assets_for(protocol, chain)
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Reserve account address for a symbol in an account-model market.
    pub fn reserve_address(
        &self,
        protocol: Protocol,
        chain: Chain,
        symbol: &str,
    ) -> Option<&'static str> {
        self.account_model_addresses(protocol, chain)?
            .reserves
            .iter()
            .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
            .map(|(_, addr)| *addr)
    }

    /// Symbol for a reserve account address, if it belongs to a known market.
    pub fn symbol_for_reserve(
        &self,
        protocol: Protocol,
        chain: Chain,
        reserve: &str,
    ) -> Option<&'static str> {
        self.account_model_addresses(protocol, chain)?
            .reserves
            .iter()
            .find(|(_, addr)| *addr == reserve)
            .map(|(s, _)| *s)
    }

    /// Every supported (chain, protocol) pair with its asset symbols.
    pub fn supported_matrix(&self) -> Vec<SupportedMarket> {
        let mut out = Vec::new();
        for &chain in Chain::ALL {
            for &protocol in Protocol::ALL {
                if !self.is_supported(protocol, chain) {
                    continue;
                }
                out.push(SupportedMarket {
                    chain,
                    protocol,
                    assets: self
                        .assets_for(protocol, chain)
                        .iter()
                        .map(|a| a.symbol.to_owned())
                        .collect(),
                });
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedMarket {
    pub chain: Chain,
    pub protocol: Protocol,
    pub assets: Vec<String>,
}
