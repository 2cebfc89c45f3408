//! Wire data model shared by the engines and the service facade.
//!
//! Serialized field names must match what the existing dashboard consumes,
//! including its `APY`/`APR`/`USD` capitalization, so the acronym-bearing
//! fields carry explicit renames instead of relying on `camelCase` alone.
//! Native-unit amounts are string-encoded integers (they routinely exceed
//! the 53-bit safe range of JSON numbers); USD values and percentages are
//! plain floats.

use crate::errors::ApiErrorBody;
use crate::registry::{Chain, Protocol};
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch; the timestamp unit used everywhere.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    pub address: String,
    pub chain: Chain,
}

/// The central normalized record: one per (asset, chain, protocol) per fetch.
/// Never persisted; recomputed on each request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingRate {
    pub asset: Asset,
    pub chain: Chain,
    pub protocol: Protocol,
    #[serde(rename = "supplyAPY")]
    pub supply_apy: f64,
    #[serde(rename = "borrowAPY")]
    pub borrow_apy: f64,
    #[serde(rename = "supplyAPR")]
    pub supply_apr: f64,
    #[serde(rename = "borrowAPR")]
    pub borrow_apr: f64,
    pub utilization_rate: f64,
    /// Native units, string-encoded integer.
    pub total_supply: String,
    /// Native units, string-encoded integer.
    pub total_borrow: String,
    #[serde(rename = "totalSupplyUSD")]
    pub total_supply_usd: f64,
    #[serde(rename = "totalBorrowUSD")]
    pub total_borrow_usd: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRates {
    pub rates: Vec<LendingRate>,
    pub chains: Vec<Chain>,
    pub protocols: Vec<Protocol>,
    pub last_updated: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    Supply,
    Borrow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestRates {
    #[serde(rename = "type")]
    pub kind: RateKind,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub best_rate: LendingRate,
    pub alternatives: Vec<LendingRate>,
    pub timestamp: i64,
}

/// Derived view of a `LendingRate` exposing what is left to borrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquidity {
    pub asset: Asset,
    pub chain: Chain,
    pub protocol: Protocol,
    /// `total_supply - total_borrow`, native units.
    pub available_liquidity: String,
    #[serde(rename = "availableLiquidityUSD")]
    pub available_liquidity_usd: f64,
    pub total_liquidity: String,
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: f64,
    pub utilization_rate: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedLiquidity {
    pub liquidity: Vec<Liquidity>,
    #[serde(rename = "totalLiquidityUSD")]
    pub total_liquidity_usd: f64,
    pub chains: Vec<Chain>,
    pub protocols: Vec<Protocol>,
    pub last_updated: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationEntry {
    pub asset: String,
    pub chain: Chain,
    pub protocol: Protocol,
    pub utilization_rate: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationSummary {
    pub utilization_rates: Vec<UtilizationEntry>,
    pub average_utilization: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSupplyPosition {
    pub asset: Asset,
    pub chain: Chain,
    pub protocol: Protocol,
    /// Native units, string-encoded integer.
    pub supplied_amount: String,
    #[serde(rename = "suppliedAmountUSD")]
    pub supplied_amount_usd: f64,
    #[serde(rename = "currentAPY")]
    pub current_apy: f64,
    pub accrued_interest: String,
    #[serde(rename = "accruedInterestUSD")]
    pub accrued_interest_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBorrowPosition {
    pub asset: Asset,
    pub chain: Chain,
    pub protocol: Protocol,
    /// Native units, string-encoded integer.
    pub borrowed_amount: String,
    #[serde(rename = "borrowedAmountUSD")]
    pub borrowed_amount_usd: f64,
    #[serde(rename = "currentAPY")]
    pub current_apy: f64,
    pub accrued_interest: String,
    #[serde(rename = "accruedInterestUSD")]
    pub accrued_interest_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_factor: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPositions {
    pub wallet_address: String,
    pub supply_positions: Vec<UserSupplyPosition>,
    pub borrow_positions: Vec<UserBorrowPosition>,
    #[serde(rename = "totalSuppliedUSD")]
    pub total_supplied_usd: f64,
    #[serde(rename = "totalBorrowedUSD")]
    pub total_borrowed_usd: f64,
    #[serde(rename = "netAPY")]
    pub net_apy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_factor: Option<f64>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Moderate,
    Risky,
    Danger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthFactor {
    pub wallet_address: String,
    pub health_factor: f64,
    pub risk_level: RiskLevel,
    #[serde(rename = "collateralUSD")]
    pub collateral_usd: f64,
    #[serde(rename = "debtUSD")]
    pub debt_usd: f64,
    #[serde(rename = "availableToBorrowUSD")]
    pub available_to_borrow_usd: f64,
    pub liquidation_threshold: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateComparisonItem {
    pub protocol: Protocol,
    pub chain: Chain,
    #[serde(rename = "supplyAPY")]
    pub supply_apy: f64,
    #[serde(rename = "borrowAPY")]
    pub borrow_apy: f64,
    pub utilization_rate: f64,
    #[serde(rename = "availableLiquidityUSD")]
    pub available_liquidity_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateComparison {
    pub asset: String,
    pub comparison: Vec<RateComparisonItem>,
    pub best_supply: LendingRate,
    pub best_borrow: LendingRate,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolTvl {
    pub protocol: Protocol,
    #[serde(rename = "tvlUSD")]
    pub tvl_usd: f64,
    pub chains: Vec<Chain>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTvl {
    pub symbol: String,
    #[serde(rename = "tvlUSD")]
    pub tvl_usd: f64,
    #[serde(rename = "supplyAPY")]
    pub supply_apy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    #[serde(rename = "totalValueLockedUSD")]
    pub total_value_locked_usd: f64,
    #[serde(rename = "totalBorrowedUSD")]
    pub total_borrowed_usd: f64,
    #[serde(rename = "averageSupplyAPY")]
    pub average_supply_apy: f64,
    #[serde(rename = "averageBorrowAPY")]
    pub average_borrow_apy: f64,
    pub top_protocols: Vec<ProtocolTvl>,
    pub top_assets: Vec<AssetTvl>,
    pub timestamp: i64,
}

/// The boundary contract with the existing dashboard: every response is
/// wrapped in `{success, data | error, timestamp}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now_ms(),
        }
    }

    pub fn err(error: impl Into<ApiErrorBody>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            timestamp: now_ms(),
        }
    }
}
