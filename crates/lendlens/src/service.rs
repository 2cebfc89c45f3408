//! Service facade: the boundary the CLI (or any transport) talks to.
//!
//! All string input is validated against the registry before any network
//! I/O, and every outcome is folded into the `ApiResponse` envelope. No
//! raw error type escapes this layer.

use crate::engine::AggregationEngine;
use crate::errors::LendingError;
use crate::model::{
    AggregatedLiquidity, AggregatedRates, ApiResponse, BestRates, HealthFactor, MarketOverview,
    RateComparison, RateKind, UserPositions, UtilizationSummary,
};
use crate::oracle::PriceOracle;
use crate::positions::PositionEngine;
use crate::provider::ChainDataProvider;
use crate::registry::{Chain, Protocol, Registry, SupportedMarket};
use serde::Serialize;
use std::sync::Arc;

/// Shorter than any real address on a supported chain.
const MIN_WALLET_LEN: usize = 20;
const MAX_WALLET_LEN: usize = 64;

fn parse_chains(filters: Option<&[String]>) -> Result<Option<Vec<Chain>>, LendingError> {
    filters
        .map(|f| f.iter().map(|s| Chain::parse(s)).collect())
        .transpose()
}

fn parse_protocols(filters: Option<&[String]>) -> Result<Option<Vec<Protocol>>, LendingError> {
    filters
        .map(|f| f.iter().map(|s| Protocol::parse(s)).collect())
        .transpose()
}

fn check_wallet(wallet: &str) -> Result<&str, LendingError> {
    let wallet = wallet.trim();
    if !(MIN_WALLET_LEN..=MAX_WALLET_LEN).contains(&wallet.len()) {
        return Err(LendingError::InvalidAddress(wallet.to_owned()));
    }
    Ok(wallet)
}

fn respond<T: Serialize>(result: Result<T, LendingError>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => ApiResponse::err(e),
    }
}

pub struct LendingService<P, O> {
    aggregation: AggregationEngine<P, O>,
    positions: PositionEngine<P, O>,
    registry: Registry,
}

impl<P: ChainDataProvider, O: PriceOracle> LendingService<P, O> {
    pub fn new(provider: Arc<P>, oracle: Arc<O>, registry: Registry) -> Self {
        Self {
            aggregation: AggregationEngine::new(
                Arc::clone(&provider),
                Arc::clone(&oracle),
                registry,
            ),
            positions: PositionEngine::new(provider, oracle, registry),
            registry,
        }
    }

    /// `NotFound` before any I/O when no configured market lists the symbol.
    fn check_asset(&self, symbol: &str) -> Result<(), LendingError> {
        let listed = self
            .registry
            .supported_matrix()
            .into_iter()
            .any(|m| self.registry.find_asset(symbol, m.protocol, m.chain).is_some());
        if listed {
            Ok(())
        } else {
            Err(LendingError::NotFound(format!(
                "no configured market lists asset {symbol}"
            )))
        }
    }

    pub async fn rates(
        &self,
        chains: Option<&[String]>,
        protocols: Option<&[String]>,
    ) -> ApiResponse<AggregatedRates> {
        let result = async {
            let chains = parse_chains(chains)?;
            let protocols = parse_protocols(protocols)?;
            self.aggregation
                .aggregated_rates(chains.as_deref(), protocols.as_deref())
                .await
        };
        respond(result.await)
    }

    pub async fn best_rates(
        &self,
        asset: &str,
        kind: RateKind,
        amount: Option<f64>,
    ) -> ApiResponse<BestRates> {
        let result = async {
            self.check_asset(asset)?;
            self.aggregation.best_rates(asset, kind, amount).await
        };
        respond(result.await)
    }

    pub async fn compare_rates(
        &self,
        asset: &str,
        chains: Option<&[String]>,
        protocols: Option<&[String]>,
    ) -> ApiResponse<RateComparison> {
        let result = async {
            self.check_asset(asset)?;
            let chains = parse_chains(chains)?;
            let protocols = parse_protocols(protocols)?;
            self.aggregation
                .compare_rates(asset, chains.as_deref(), protocols.as_deref())
                .await
        };
        respond(result.await)
    }

    pub async fn liquidity(
        &self,
        chains: Option<&[String]>,
        protocols: Option<&[String]>,
    ) -> ApiResponse<AggregatedLiquidity> {
        let result = async {
            let chains = parse_chains(chains)?;
            let protocols = parse_protocols(protocols)?;
            self.aggregation
                .aggregated_liquidity(chains.as_deref(), protocols.as_deref())
                .await
        };
        respond(result.await)
    }

    pub async fn utilization(
        &self,
        chains: Option<&[String]>,
        protocols: Option<&[String]>,
    ) -> ApiResponse<UtilizationSummary> {
        let result = async {
            let chains = parse_chains(chains)?;
            let protocols = parse_protocols(protocols)?;
            self.aggregation
                .utilization_rates(chains.as_deref(), protocols.as_deref())
                .await
        };
        respond(result.await)
    }

    pub async fn overview(&self) -> ApiResponse<MarketOverview> {
        respond(self.aggregation.market_overview().await)
    }

    pub async fn user_positions(
        &self,
        wallet: &str,
        chains: Option<&[String]>,
        protocols: Option<&[String]>,
    ) -> ApiResponse<UserPositions> {
        let result = async {
            let wallet = check_wallet(wallet)?;
            let chains = parse_chains(chains)?;
            let protocols = parse_protocols(protocols)?;
            self.positions
                .user_positions(wallet, chains.as_deref(), protocols.as_deref())
                .await
        };
        respond(result.await)
    }

    pub async fn user_health(&self, wallet: &str) -> ApiResponse<HealthFactor> {
        let result = async {
            let wallet = check_wallet(wallet)?;
            self.positions.user_health_factor(wallet).await
        };
        respond(result.await)
    }

    /// Purely registry-backed; never touches the network.
    pub fn supported(&self) -> ApiResponse<Vec<SupportedMarket>> {
        ApiResponse::ok(self.registry.supported_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StaticPriceOracle;
    use crate::testutil::{reserve_bytes, sol_reserve_pubkey, sol_reserve_spec, MockChain};

    fn service(chain: MockChain) -> LendingService<MockChain, StaticPriceOracle> {
        LendingService::new(
            Arc::new(chain),
            Arc::new(StaticPriceOracle::default()),
            Registry::new(),
        )
    }

    fn error_code<T>(resp: &ApiResponse<T>) -> Option<&str> {
        resp.error.as_ref().map(|e| e.code)
    }

    #[tokio::test]
    async fn bad_chain_filter_is_rejected_before_any_rpc() {
        // A dead provider would turn any fetch into aggregation_failed, so
        // invalid_chain here proves validation ran first.
        let svc = service(MockChain::new());
        let resp = svc.rates(Some(&["near".to_owned()]), None).await;
        assert!(!resp.success, "filter must be rejected");
        assert_eq!(error_code(&resp), Some("invalid_chain"));

        let resp = svc.rates(None, Some(&["compound".to_owned()])).await;
        assert_eq!(error_code(&resp), Some("invalid_protocol"));
    }

    #[tokio::test]
    async fn unknown_asset_is_not_found_before_any_rpc() {
        let svc = service(MockChain::new());
        let resp = svc.best_rates("DOGE", RateKind::Supply, None).await;
        assert_eq!(error_code(&resp), Some("not_found"));
        // A listed asset passes validation and reaches the dead provider.
        let resp = svc.best_rates("USDC", RateKind::Supply, None).await;
        assert_eq!(error_code(&resp), Some("aggregation_failed"));
    }

    #[tokio::test]
    async fn wallet_sanity_check_runs_first() {
        let svc = service(MockChain::new());
        let resp = svc.user_positions("0x123", None, None).await;
        assert_eq!(error_code(&resp), Some("invalid_address"), "too short");
        let resp = svc.user_health("  ").await;
        assert_eq!(error_code(&resp), Some("invalid_address"), "blank");
    }

    #[tokio::test]
    async fn rates_envelope_wraps_merged_data() -> eyre::Result<()> {
        let chain = MockChain::new()
            .with_account(sol_reserve_pubkey()?, reserve_bytes(&sol_reserve_spec()?));
        let resp = service(chain).rates(None, None).await;
        assert!(resp.success, "canned source must produce data");
        let data = resp.data.ok_or_else(|| eyre::eyre!("success without data"))?;
        assert_eq!(data.rates.len(), 1);
        assert!(resp.error.is_none(), "no error body on success");
        Ok(())
    }

    #[test]
    fn supported_is_offline() {
        let resp = service(MockChain::new()).supported();
        assert!(resp.success, "registry lookup cannot fail");
        let markets = resp.data.unwrap_or_default();
        assert_eq!(markets.len(), 2, "aave/ethereum and solend/solana");
    }
}
