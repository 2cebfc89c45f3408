//! Per-wallet portfolio view: positions and health merged across every
//! protocol the wallet is addressable on.
//!
//! One wallet string cannot be valid on every chain (an EVM address is not
//! a Solana pubkey), so a source rejecting the address format is treated as
//! "not applicable" and skipped without counting as a failure. Only when
//! the wallet parses nowhere is the address itself the error.

use crate::adapters::account_model::AccountModelAdapter;
use crate::adapters::evm_pool::EvmPoolAdapter;
use crate::adapters::AccountHealthInputs;
use crate::decode;
use crate::errors::LendingError;
use crate::financial_math;
use crate::model::{
    now_ms, HealthFactor, RiskLevel, UserBorrowPosition, UserPositions, UserSupplyPosition,
};
use crate::oracle::PriceOracle;
use crate::provider::ChainDataProvider;
use crate::registry::{Chain, Protocol, Registry};
use std::sync::Arc;
use tracing::{debug, warn};

type SourcePositions = (
    Vec<UserSupplyPosition>,
    Vec<UserBorrowPosition>,
    AccountHealthInputs,
);

async fn fetch_positions<P: ChainDataProvider, O: PriceOracle>(
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
    protocol: Protocol,
    chain: Chain,
    wallet: String,
) -> Result<SourcePositions, LendingError> {
    match protocol {
        Protocol::Aave => {
            EvmPoolAdapter::new(provider, oracle, registry, protocol, chain)?
                .user_positions(&wallet)
                .await
        }
        Protocol::Solend => {
            AccountModelAdapter::new(provider, oracle, registry, protocol, chain)?
                .user_positions(&wallet)
                .await
        }
    }
}

async fn fetch_health<P: ChainDataProvider, O: PriceOracle>(
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
    protocol: Protocol,
    chain: Chain,
    wallet: String,
) -> Result<AccountHealthInputs, LendingError> {
    match protocol {
        Protocol::Aave => {
            EvmPoolAdapter::new(provider, oracle, registry, protocol, chain)?
                .account_health(&wallet)
                .await
        }
        Protocol::Solend => {
            AccountModelAdapter::new(provider, oracle, registry, protocol, chain)?
                .account_health(&wallet)
                .await
        }
    }
}

/// Collapse per-source health inputs into one: collateral and debt add up,
/// the liquidation threshold is collateral-weighted.
fn combine_health(inputs: &[AccountHealthInputs]) -> AccountHealthInputs {
    let collaterals: Vec<f64> = inputs.iter().map(|h| h.collateral_usd).collect();
    let debts: Vec<f64> = inputs.iter().map(|h| h.debt_usd).collect();
    let thresholds: Vec<f64> = inputs.iter().map(|h| h.liquidation_threshold_pct).collect();
    AccountHealthInputs {
        collateral_usd: financial_math::sum(collaterals.iter().copied()),
        debt_usd: financial_math::sum(debts),
        liquidation_threshold_pct: financial_math::weighted_average(&thresholds, &collaterals),
    }
}

pub(crate) fn risk_level(health_factor: f64) -> RiskLevel {
    if health_factor >= 2.0 {
        RiskLevel::Safe
    } else if health_factor >= 1.5 {
        RiskLevel::Moderate
    } else if health_factor >= 1.1 {
        RiskLevel::Risky
    } else {
        RiskLevel::Danger
    }
}

pub struct PositionEngine<P, O> {
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
}

impl<P: ChainDataProvider, O: PriceOracle> PositionEngine<P, O> {
    pub fn new(provider: Arc<P>, oracle: Arc<O>, registry: Registry) -> Self {
        Self {
            provider,
            oracle,
            registry,
        }
    }

    fn targets(
        &self,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Vec<(Protocol, Chain)> {
        self.registry
            .supported_matrix()
            .into_iter()
            .filter(|m| !chains.is_some_and(|f| !f.contains(&m.chain)))
            .filter(|m| !protocols.is_some_and(|f| !f.contains(&m.protocol)))
            .map(|m| (m.protocol, m.chain))
            .collect()
    }

    /// Per-source results for the wallet. `InvalidAddress` from a source
    /// means the wallet is not of that chain's format; those are skipped.
    async fn collect_sources<T, F, Fut>(
        &self,
        wallet: &str,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
        fetch: F,
    ) -> Result<Vec<T>, LendingError>
    where
        T: Send + 'static,
        F: Fn(Arc<P>, Arc<O>, Registry, Protocol, Chain, String) -> Fut,
        Fut: std::future::Future<Output = Result<T, LendingError>> + Send + 'static,
    {
        let mut handles = Vec::new();
        for (protocol, chain) in self.targets(chains, protocols) {
            let fut = fetch(
                Arc::clone(&self.provider),
                Arc::clone(&self.oracle),
                self.registry,
                protocol,
                chain,
                wallet.to_owned(),
            );
            handles.push((protocol, chain, tokio::spawn(fut)));
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (protocol, chain, handle) in handles {
            match handle.await {
                Ok(Ok(r)) => results.push(r),
                Ok(Err(LendingError::InvalidAddress(_))) => {
                    debug!(%protocol, %chain, "wallet not addressable on this chain");
                }
                Ok(Err(e)) => {
                    warn!(%protocol, %chain, error = %e, "position source failed");
                    failures.push(e.to_string());
                }
                Err(e) => {
                    warn!(%protocol, %chain, error = %e, "position task aborted");
                    failures.push(format!("{protocol} on {chain}: task aborted"));
                }
            }
        }
        if results.is_empty() {
            if failures.is_empty() {
                // Every source rejected the format outright.
                return Err(LendingError::InvalidAddress(wallet.to_owned()));
            }
            return Err(LendingError::AggregationFailed(failures.join("; ")));
        }
        Ok(results)
    }

    pub async fn user_positions(
        &self,
        wallet: &str,
        chains: Option<&[Chain]>,
        protocols: Option<&[Protocol]>,
    ) -> Result<UserPositions, LendingError> {
        let sources = self
            .collect_sources(wallet, chains, protocols, fetch_positions)
            .await?;

        let mut supply_positions = Vec::new();
        let mut borrow_positions = Vec::new();
        let mut health_inputs = Vec::new();
        for (mut supplies, mut borrows, health) in sources {
            supply_positions.append(&mut supplies);
            borrow_positions.append(&mut borrows);
            health_inputs.push(health);
        }

        let total_supplied_usd =
            financial_math::sum(supply_positions.iter().map(|p| p.supplied_amount_usd));
        let total_borrowed_usd =
            financial_math::sum(borrow_positions.iter().map(|p| p.borrowed_amount_usd));
        let income = financial_math::annual_flow_usd(
            supply_positions
                .iter()
                .map(|p| (p.supplied_amount_usd, p.current_apy)),
        );
        let cost = financial_math::annual_flow_usd(
            borrow_positions
                .iter()
                .map(|p| (p.borrowed_amount_usd, p.current_apy)),
        );

        let health = combine_health(&health_inputs);
        let hf = decode::calculate_health_factor(
            health.collateral_usd,
            health.debt_usd,
            health.liquidation_threshold_pct,
        );

        Ok(UserPositions {
            wallet_address: wallet.to_owned(),
            supply_positions,
            borrow_positions,
            total_supplied_usd,
            total_borrowed_usd,
            net_apy: financial_math::net_apy(total_supplied_usd, income, cost),
            health_factor: hf.is_finite().then_some(hf),
            timestamp: now_ms(),
        })
    }

    pub async fn user_health_factor(&self, wallet: &str) -> Result<HealthFactor, LendingError> {
        let inputs = self.collect_sources(wallet, None, None, fetch_health).await?;
        let health = combine_health(&inputs);
        let hf = decode::calculate_health_factor(
            health.collateral_usd,
            health.debt_usd,
            health.liquidation_threshold_pct,
        );
        Ok(HealthFactor {
            wallet_address: wallet.to_owned(),
            health_factor: hf,
            risk_level: risk_level(hf),
            collateral_usd: health.collateral_usd,
            debt_usd: health.debt_usd,
            available_to_borrow_usd: financial_math::available_to_borrow(
                health.collateral_usd,
                health.debt_usd,
            ),
            liquidation_threshold: health.liquidation_threshold_pct,
            timestamp: now_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::account_model::obligation_address;
    use crate::oracle::StaticPriceOracle;
    use crate::testutil::{
        obligation_bytes, reserve_bytes, sol_reserve_pubkey, sol_reserve_spec, MockChain, WAD,
    };
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr as _;

    const TOL: f64 = 1e-6;

    fn engine(chain: MockChain) -> PositionEngine<MockChain, StaticPriceOracle> {
        PositionEngine::new(
            Arc::new(chain),
            Arc::new(StaticPriceOracle::default()),
            Registry::new(),
        )
    }

    fn chain_with_obligation(wallet: &Pubkey) -> eyre::Result<MockChain> {
        let spec = sol_reserve_spec()?;
        let reserve_key = sol_reserve_pubkey()?;
        let reg = Registry::new();
        let addrs = reg
            .account_model_addresses(Protocol::Solend, Chain::Solana)
            .ok_or_else(|| eyre::eyre!("solend deployment missing"))?;
        let program = Pubkey::from_str(addrs.program_id)?;
        let obligation_key = obligation_address(wallet, addrs.main_market, &program)?;
        // 10 SOL deposited ($1000), 2 SOL borrowed ($200).
        let obligation = obligation_bytes(
            &spec.market,
            wallet,
            1000 * WAD,
            200 * WAD,
            850 * WAD,
            &[(reserve_key, 10_000_000_000, 1000 * WAD)],
            &[(reserve_key, WAD / 2, 2_000_000_000 * WAD, 200 * WAD)],
        );
        Ok(MockChain::new()
            .with_account(reserve_key, reserve_bytes(&spec))
            .with_account(obligation_key, obligation))
    }

    #[test]
    fn risk_bands() {
        assert_eq!(risk_level(f64::INFINITY), RiskLevel::Safe, "no debt");
        assert_eq!(risk_level(2.0), RiskLevel::Safe);
        assert_eq!(risk_level(1.999_999), RiskLevel::Moderate);
        assert_eq!(risk_level(1.7), RiskLevel::Moderate);
        assert_eq!(risk_level(1.2), RiskLevel::Risky);
        assert_eq!(risk_level(1.099_999), RiskLevel::Danger);
        assert_eq!(risk_level(1.0), RiskLevel::Danger);
    }

    #[test]
    fn combined_health_weights_threshold_by_collateral() {
        let combined = combine_health(&[
            AccountHealthInputs {
                collateral_usd: 3000.0,
                debt_usd: 500.0,
                liquidation_threshold_pct: 80.0,
            },
            AccountHealthInputs {
                collateral_usd: 1000.0,
                debt_usd: 100.0,
                liquidation_threshold_pct: 60.0,
            },
        ]);
        assert!((combined.collateral_usd - 4000.0).abs() < TOL);
        assert!((combined.debt_usd - 600.0).abs() < TOL);
        // (80*3000 + 60*1000) / 4000.
        assert!(
            (combined.liquidation_threshold_pct - 75.0).abs() < TOL,
            "got {}",
            combined.liquidation_threshold_pct
        );
    }

    #[tokio::test]
    async fn positions_merge_and_total_across_sources() -> eyre::Result<()> {
        let wallet = Pubkey::new_unique();
        let eng = engine(chain_with_obligation(&wallet)?);
        let p = eng.user_positions(&wallet.to_string(), None, None).await?;

        assert_eq!(p.wallet_address, wallet.to_string());
        assert_eq!(p.supply_positions.len(), 1);
        assert_eq!(p.borrow_positions.len(), 1);
        assert!((p.total_supplied_usd - 1000.0).abs() < TOL, "got {}", p.total_supplied_usd);
        assert!((p.total_borrowed_usd - 200.0).abs() < TOL, "got {}", p.total_borrowed_usd);
        // Supply earns on 5x the borrowed value at over half the borrow
        // rate, so the portfolio nets positive but below the supply APY.
        assert!(p.net_apy > 0.0, "got {}", p.net_apy);
        assert!(p.net_apy < p.supply_positions[0].current_apy, "got {}", p.net_apy);
        let hf = p
            .health_factor
            .ok_or_else(|| eyre::eyre!("indebted portfolio must carry a health factor"))?;
        // 1000 * 85% / 200.
        assert!((hf - 4.25).abs() < TOL, "got {hf}");
        Ok(())
    }

    #[tokio::test]
    async fn unaddressable_wallet_is_an_address_error() {
        let r = engine(MockChain::new())
            .user_positions("not-a-wallet", None, None)
            .await;
        assert!(
            matches!(r, Err(LendingError::InvalidAddress(_))),
            "wallet parses on no chain, got {r:?}"
        );
    }

    #[tokio::test]
    async fn evm_wallet_with_dead_rpc_is_an_aggregation_failure() {
        // The address format is fine for the EVM source, but nothing is
        // canned, so its only applicable source fails.
        let wallet = "0x1111111111111111111111111111111111111111";
        let r = engine(MockChain::new()).user_positions(wallet, None, None).await;
        assert!(
            matches!(r, Err(LendingError::AggregationFailed(_))),
            "got {r:?}"
        );
    }

    #[tokio::test]
    async fn health_without_debt_is_safe() -> eyre::Result<()> {
        // Solana wallet, no obligation account anywhere.
        let spec = sol_reserve_spec()?;
        let chain = MockChain::new().with_account(sol_reserve_pubkey()?, reserve_bytes(&spec));
        let wallet = Pubkey::new_unique().to_string();
        let h = engine(chain).user_health_factor(&wallet).await?;
        assert!(h.health_factor.is_infinite(), "no debt, got {}", h.health_factor);
        assert_eq!(h.risk_level, RiskLevel::Safe);
        assert!(h.collateral_usd.abs() < TOL && h.debt_usd.abs() < TOL);
        assert!(h.available_to_borrow_usd.abs() < TOL);
        Ok(())
    }

    #[tokio::test]
    async fn health_factor_reflects_obligation() -> eyre::Result<()> {
        let wallet = Pubkey::new_unique();
        let h = engine(chain_with_obligation(&wallet)?)
            .user_health_factor(&wallet.to_string())
            .await?;
        assert!((h.health_factor - 4.25).abs() < TOL, "got {}", h.health_factor);
        assert_eq!(h.risk_level, RiskLevel::Safe);
        assert!((h.collateral_usd - 1000.0).abs() < TOL);
        assert!((h.debt_usd - 200.0).abs() < TOL);
        // 1000 * 0.8 - 200.
        assert!(
            (h.available_to_borrow_usd - 600.0).abs() < TOL,
            "got {}",
            h.available_to_borrow_usd
        );
        assert!((h.liquidation_threshold - 85.0).abs() < TOL);
        Ok(())
    }
}
