//! Protocol adapters: one per on-chain lending design.
//!
//! `evm_pool` speaks to pool-style contracts over `eth_call`; `account_model`
//! deserializes raw Solana account buffers. Both normalize into the shared
//! wire model so the engines never branch on protocol.

pub mod account_model;
pub mod evm_pool;

use crate::model::Asset;
use crate::registry::{AssetConfig, Chain};

/// Risk inputs one protocol contributes to the wallet-level health factor.
/// Summed across protocols before the final ratio is taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountHealthInputs {
    pub collateral_usd: f64,
    pub debt_usd: f64,
    /// Collateral-weighted liquidation threshold, percent.
    pub liquidation_threshold_pct: f64,
}

pub(crate) fn asset_model(cfg: &AssetConfig, chain: Chain) -> Asset {
    Asset {
        symbol: cfg.symbol.to_owned(),
        name: cfg.name.to_owned(),
        decimals: cfg.decimals,
        address: cfg.address.to_owned(),
        chain,
    }
}
