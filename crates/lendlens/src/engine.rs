//! Cross-protocol aggregation: fans one request out to every supported
//! (protocol, chain) source, merges what succeeds, and derives the
//! comparison/overview views from the merged rates.
//!
//! Partial failure is the normal case. A source that errors is logged and
//! dropped; the request only fails when nothing at all came back and at
//! least one source actually failed.

use crate::adapters::account_model::AccountModelAdapter;
use crate::adapters::evm_pool::EvmPoolAdapter;
use crate::decode;
use crate::errors::LendingError;
use crate::financial_math;
use crate::model::{
    now_ms, AggregatedLiquidity, AggregatedRates, AssetTvl, BestRates, LendingRate, Liquidity,
    MarketOverview, ProtocolTvl, RateComparison, RateComparisonItem, RateKind, UtilizationEntry,
    UtilizationSummary,
};
use crate::oracle::PriceOracle;
use crate::provider::ChainDataProvider;
use crate::registry::{Chain, Protocol, Registry};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// How many runner-up rates a best-rate answer carries.
const MAX_ALTERNATIVES: usize = 4;
/// How many assets the market overview lists.
const TOP_ASSETS: usize = 10;

async fn fetch_rates<P: ChainDataProvider, O: PriceOracle>(
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
    protocol: Protocol,
    chain: Chain,
) -> Result<Vec<LendingRate>, LendingError> {
    match protocol {
        Protocol::Aave => {
            EvmPoolAdapter::new(provider, oracle, registry, protocol, chain)?
                .market_rates()
                .await
        }
        Protocol::Solend => {
            AccountModelAdapter::new(provider, oracle, registry, protocol, chain)?
                .market_rates()
                .await
        }
    }
}

fn by_rate(kind: RateKind) -> impl Fn(&LendingRate, &LendingRate) -> Ordering {
    move |a, b| match kind {
        // Suppliers want the highest yield, borrowers the lowest cost.
        RateKind::Supply => b
            .supply_apy
            .partial_cmp(&a.supply_apy)
            .unwrap_or(Ordering::Equal),
        RateKind::Borrow => a
            .borrow_apy
            .partial_cmp(&b.borrow_apy)
            .unwrap_or(Ordering::Equal),
    }
}

/// Best-first ordering for one asset's rates across sources.
pub(crate) fn rank_rates(kind: RateKind, rates: &mut [LendingRate]) {
    rates.sort_by(by_rate(kind));
}

/// Market-wide totals and leaders, derived purely from merged rates.
pub(crate) fn overview_from_rates(rates: &[LendingRate], timestamp: i64) -> MarketOverview {
    let total_value_locked_usd = financial_math::sum(rates.iter().map(|r| r.total_supply_usd));
    let total_borrowed_usd = financial_math::sum(rates.iter().map(|r| r.total_borrow_usd));
    let supply_apys: Vec<f64> = rates.iter().map(|r| r.supply_apy).collect();
    let borrow_apys: Vec<f64> = rates.iter().map(|r| r.borrow_apy).collect();

    let mut per_protocol: BTreeMap<Protocol, (Vec<f64>, BTreeSet<Chain>)> = BTreeMap::new();
    for r in rates {
        let entry = per_protocol.entry(r.protocol).or_default();
        entry.0.push(r.total_supply_usd);
        entry.1.insert(r.chain);
    }
    let mut top_protocols: Vec<ProtocolTvl> = per_protocol
        .into_iter()
        .map(|(protocol, (tvls, chains))| ProtocolTvl {
            protocol,
            tvl_usd: financial_math::sum(tvls),
            chains: chains.into_iter().collect(),
        })
        .collect();
    top_protocols.sort_by(|a, b| b.tvl_usd.partial_cmp(&a.tvl_usd).unwrap_or(Ordering::Equal));

    let mut per_asset: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in rates {
        let entry = per_asset.entry(r.asset.symbol.clone()).or_default();
        entry.0.push(r.total_supply_usd);
        entry.1.push(r.supply_apy);
    }
    let mut top_assets: Vec<AssetTvl> = per_asset
        .into_iter()
        .map(|(symbol, (tvls, apys))| AssetTvl {
            symbol,
            tvl_usd: financial_math::sum(tvls),
            supply_apy: financial_math::mean(&apys),
        })
        .collect();
    top_assets.sort_by(|a, b| b.tvl_usd.partial_cmp(&a.tvl_usd).unwrap_or(Ordering::Equal));
    top_assets.truncate(TOP_ASSETS);

    MarketOverview {
        total_value_locked_usd,
        total_borrowed_usd,
        average_supply_apy: financial_math::mean(&supply_apys),
        average_borrow_apy: financial_math::mean(&borrow_apys),
        top_protocols,
        top_assets,
        timestamp,
    }
}

/// Liquidity view of one merged rate: available = supplied - borrowed,
/// in both native units and USD.
pub(crate) fn liquidity_from_rate(r: &LendingRate) -> Result<Liquidity, LendingError> {
    let supplied = decode::parse_u256_dec(&r.total_supply)?;
    let borrowed = decode::parse_u256_dec(&r.total_borrow)?;
    Ok(Liquidity {
        asset: r.asset.clone(),
        chain: r.chain,
        protocol: r.protocol,
        available_liquidity: supplied.saturating_sub(borrowed).to_string(),
        available_liquidity_usd: financial_math::market_available_usd(
            r.total_supply_usd,
            r.total_borrow_usd,
        ),
        total_liquidity: r.total_supply.clone(),
        total_liquidity_usd: r.total_supply_usd,
        utilization_rate: r.utilization_rate,
        timestamp: r.timestamp,
    })
}

pub struct AggregationEngine<P, O> {
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
}

impl<P: ChainDataProvider, O: PriceOracle> AggregationEngine<P, O> {
    pub fn new(provider: Arc<P>, oracle: Arc<O>, registry: Registry) -> Self {
        Self {
            provider,
            oracle,
            registry,
        }
    }

    /// Supported (protocol, chain) sources, optionally narrowed.
    fn targets(
        &self,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Vec<(Protocol, Chain)> {
        let mut out = Vec::new();
        for &chain in Chain::ALL {
            if chains.is_some_and(|f| !f.contains(&chain)) {
                continue;
            }
            for &protocol in Protocol::ALL {
                if protocols.is_some_and(|f| !f.contains(&protocol)) {
                    continue;
                }
                if self.registry.is_supported(protocol, chain) {
                    out.push((protocol, chain));
                }
            }
        }
        out
    }

    /// Fan rate queries out, merge survivors in source order.
    async fn merged_rates(
        &self,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<Vec<LendingRate>, LendingError> {
        let mut handles = Vec::new();
        for (protocol, chain) in self.targets(chains, protocols) {
            let provider = Arc::clone(&self.provider);
            let oracle = Arc::clone(&self.oracle);
            let registry = self.registry;
            handles.push((
                protocol,
                chain,
                tokio::spawn(fetch_rates(provider, oracle, registry, protocol, chain)),
            ));
        }

        let mut rates = Vec::new();
        let mut failures = Vec::new();
        for (protocol, chain, handle) in handles {
            match handle.await {
                Ok(Ok(mut source_rates)) => rates.append(&mut source_rates),
                Ok(Err(e)) => {
                    warn!(%protocol, %chain, error = %e, "rate source failed");
                    failures.push(e.to_string());
                }
                Err(e) => {
                    warn!(%protocol, %chain, error = %e, "rate task aborted");
                    failures.push(format!("{protocol} on {chain}: task aborted"));
                }
            }
        }
        if rates.is_empty() && !failures.is_empty() {
            return Err(LendingError::AggregationFailed(failures.join("; ")));
        }
        Ok(rates)
    }

    pub async fn aggregated_rates(
        &self,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<AggregatedRates, LendingError> {
        let rates = self.merged_rates(chains, protocols).await?;
        let chain_set: BTreeSet<Chain> = rates.iter().map(|r| r.chain).collect();
        let protocol_set: BTreeSet<Protocol> = rates.iter().map(|r| r.protocol).collect();
        Ok(AggregatedRates {
            rates,
            chains: chain_set.into_iter().collect(),
            protocols: protocol_set.into_iter().collect(),
            last_updated: now_ms(),
        })
    }

    /// Rates for one asset across the requested sources, or `NotFound`
    /// if nobody lists it.
    async fn rates_for_asset(
        &self,
        asset: &str,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<Vec<LendingRate>, LendingError> {
        let rates: Vec<LendingRate> = self
            .merged_rates(chains, protocols)
            .await?
            .into_iter()
            .filter(|r| r.asset.symbol.eq_ignore_ascii_case(asset))
            .collect();
        if rates.is_empty() {
            return Err(LendingError::NotFound(format!(
                "no market lists asset {asset}"
            )));
        }
        Ok(rates)
    }

    pub async fn best_rates(
        &self,
        asset: &str,
        kind: RateKind,
        amount: Option<f64>,
    ) -> Result<BestRates, LendingError> {
        let mut rates = self.rates_for_asset(asset, None, None).await?;
        rank_rates(kind, &mut rates);
        let mut it = rates.into_iter();
        let best_rate = it
            .next()
            .ok_or_else(|| LendingError::NotFound(format!("no market lists asset {asset}")))?;
        Ok(BestRates {
            kind,
            asset: best_rate.asset.symbol.clone(),
            amount,
            best_rate,
            alternatives: it.take(MAX_ALTERNATIVES).collect(),
            timestamp: now_ms(),
        })
    }

    pub async fn compare_rates(
        &self,
        asset: &str,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<RateComparison, LendingError> {
        let rates = self.rates_for_asset(asset, chains, protocols).await?;
        let comparison = rates
            .iter()
            .map(|r| RateComparisonItem {
                protocol: r.protocol,
                chain: r.chain,
                supply_apy: r.supply_apy,
                borrow_apy: r.borrow_apy,
                utilization_rate: r.utilization_rate,
                available_liquidity_usd: financial_math::market_available_usd(
                    r.total_supply_usd,
                    r.total_borrow_usd,
                ),
            })
            .collect();

        let mut supply_ranked = rates.clone();
        rank_rates(RateKind::Supply, &mut supply_ranked);
        let mut borrow_ranked = rates;
        rank_rates(RateKind::Borrow, &mut borrow_ranked);
        let (Some(best_supply), Some(best_borrow)) =
            (supply_ranked.into_iter().next(), borrow_ranked.into_iter().next())
        else {
            return Err(LendingError::NotFound(format!(
                "no market lists asset {asset}"
            )));
        };
        Ok(RateComparison {
            asset: best_supply.asset.symbol.clone(),
            comparison,
            best_supply,
            best_borrow,
            timestamp: now_ms(),
        })
    }

    /// Liquidity per market, derived from the same merged rate snapshot
    /// that backs the rate views. No second fetch.
    pub async fn aggregated_liquidity(
        &self,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<AggregatedLiquidity, LendingError> {
        let liquidity = self
            .merged_rates(chains, protocols)
            .await?
            .iter()
            .map(liquidity_from_rate)
            .collect::<Result<Vec<Liquidity>, LendingError>>()?;

        let total_liquidity_usd =
            financial_math::sum(liquidity.iter().map(|l| l.total_liquidity_usd));
        let chain_set: BTreeSet<Chain> = liquidity.iter().map(|l| l.chain).collect();
        let protocol_set: BTreeSet<Protocol> = liquidity.iter().map(|l| l.protocol).collect();
        Ok(AggregatedLiquidity {
            liquidity,
            total_liquidity_usd,
            chains: chain_set.into_iter().collect(),
            protocols: protocol_set.into_iter().collect(),
            last_updated: now_ms(),
        })
    }

    pub async fn utilization_rates(
        &self,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<UtilizationSummary, LendingError> {
        let rates = self.merged_rates(chains, protocols).await?;
        let utilizations: Vec<f64> = rates.iter().map(|r| r.utilization_rate).collect();
        let timestamp = now_ms();
        Ok(UtilizationSummary {
            utilization_rates: rates
                .into_iter()
                .map(|r| UtilizationEntry {
                    asset: r.asset.symbol,
                    chain: r.chain,
                    protocol: r.protocol,
                    utilization_rate: r.utilization_rate,
                    timestamp: r.timestamp,
                })
                .collect(),
            average_utilization: financial_math::mean(&utilizations),
            timestamp,
        })
    }

    pub async fn market_overview(&self) -> Result<MarketOverview, LendingError> {
        let rates = self.merged_rates(None, None).await?;
        Ok(overview_from_rates(&rates, now_ms()))
    }
}
