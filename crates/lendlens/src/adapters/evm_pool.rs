//! Pool-style EVM lending protocol (Aave V3 layout): reserve state lives in
//! contracts and is read through three view surfaces — the pool itself, the
//! protocol data provider, and the price oracle.

use crate::adapters::{asset_model, AccountHealthInputs};
use crate::decode;
use crate::errors::LendingError;
use crate::financial_math;
use crate::model::{now_ms, LendingRate, UserBorrowPosition, UserSupplyPosition};
use crate::oracle::PriceOracle;
use crate::provider::ChainDataProvider;
use crate::registry::{AssetConfig, Chain, EvmPoolAddresses, Protocol, Registry};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall as _;
use std::sync::Arc;
use tracing::{debug, warn};

sol! {
    contract IPool {
        struct ReserveData {
            uint256 configuration;
            uint128 liquidityIndex;
            uint128 currentLiquidityRate;
            uint128 variableBorrowIndex;
            uint128 currentVariableBorrowRate;
            uint128 currentStableBorrowRate;
            uint40 lastUpdateTimestamp;
            uint16 id;
            address aTokenAddress;
            address stableDebtTokenAddress;
            address variableDebtTokenAddress;
            address interestRateStrategyAddress;
            uint128 accruedToTreasury;
            uint128 unbacked;
            uint128 isolationModeTotalDebt;
        }

        function getReserveData(address asset) external view returns (ReserveData memory);
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }

    contract IPoolDataProvider {
        function getReserveData(address asset) external view returns (
            uint256 unbacked,
            uint256 accruedToTreasuryScaled,
            uint256 totalAToken,
            uint256 totalStableDebt,
            uint256 totalVariableDebt,
            uint256 liquidityRate,
            uint256 variableBorrowRate,
            uint256 stableBorrowRate,
            uint256 averageStableBorrowRate,
            uint256 liquidityIndex,
            uint256 variableBorrowIndex,
            uint40 lastUpdateTimestamp
        );
        function getUserReserveData(address asset, address user) external view returns (
            uint256 currentATokenBalance,
            uint256 currentStableDebt,
            uint256 currentVariableDebt,
            uint256 principalStableDebt,
            uint256 scaledVariableDebt,
            uint256 stableBorrowRate,
            uint256 liquidityRate,
            uint40 stableRateLastUpdated,
            bool usageAsCollateralEnabled
        );
    }

    contract IPriceOracle {
        function getAssetPrice(address asset) external view returns (uint256);
    }
}

/// Decimal places of the oracle's base currency (USD, 8 decimals).
const BASE_CURRENCY_DECIMALS: u32 = 8;

pub(crate) fn parse_evm_address(s: &str) -> Result<Address, LendingError> {
    s.trim()
        .parse::<Address>()
        .map_err(|_| LendingError::InvalidAddress(s.to_owned()))
}

fn u256_to_u128(v: U256, what: &str) -> Result<u128, LendingError> {
    v.try_into()
        .map_err(|_| LendingError::DecodeFailed(format!("{what} exceeds 128 bits: {v}")))
}

/// One reserve's decoded state: rates, totals and price, ready to be shaped
/// into any of the wire records.
#[derive(Debug, Clone)]
struct ReserveView {
    cfg: &'static AssetConfig,
    liquidity_rate_ray: u128,
    borrow_rate_ray: u128,
    total_supplied: U256,
    total_debt: U256,
    utilization: f64,
    price_usd: f64,
}

pub struct EvmPoolAdapter<P, O> {
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
    protocol: Protocol,
    chain: Chain,
    addresses: &'static EvmPoolAddresses,
}

impl<P: ChainDataProvider, O: PriceOracle> EvmPoolAdapter<P, O> {
    pub fn new(
        provider: Arc<P>,
        oracle: Arc<O>,
        registry: Registry,
        protocol: Protocol,
        chain: Chain,
    ) -> Result<Self, LendingError> {
        let addresses = registry
            .evm_pool_addresses(protocol, chain)
            .ok_or_else(|| {
                LendingError::query_failed(chain, protocol, "no pool deployment configured")
            })?;
        Ok(Self {
            provider,
            oracle,
            registry,
            protocol,
            chain,
            addresses,
        })
    }

    fn rpc_err(&self, e: &eyre::Report) -> LendingError {
        LendingError::query_failed(self.chain, self.protocol, format!("{e:#}"))
    }

    async fn call(&self, to: Address, calldata: Vec<u8>) -> Result<Bytes, LendingError> {
        self.provider
            .evm_call(to, Bytes::from(calldata))
            .await
            .map_err(|e| self.rpc_err(&e))
    }

    /// USD price for one asset: on-chain oracle first, ticker fallback,
    /// zero (with a warning) when both are silent.
    async fn reserve_price_usd(&self, cfg: &AssetConfig, oracle_addr: Address) -> f64 {
        let calldata = IPriceOracle::getAssetPriceCall {
            asset: match parse_evm_address(cfg.address) {
                Ok(a) => a,
                Err(_) => return 0.0,
            },
        }
        .abi_encode();
        match self.call(oracle_addr, calldata).await {
            Ok(out) => match IPriceOracle::getAssetPriceCall::abi_decode_returns(&out)
                .ok()
                .and_then(|p| u128::try_from(p).ok())
            {
                Some(raw) => return financial_math::scaled_to_f64(raw, BASE_CURRENCY_DECIMALS),
                None => warn!(symbol = cfg.symbol, "unparseable on-chain price"),
            },
            Err(e) => debug!(symbol = cfg.symbol, error = %e, "on-chain price unavailable"),
        }
        match self.oracle.price_usd(cfg.symbol).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                warn!(symbol = cfg.symbol, "no USD price from any source; valuing at 0");
                0.0
            }
            Err(e) => {
                warn!(symbol = cfg.symbol, error = %e, "price lookup failed; valuing at 0");
                0.0
            }
        }
    }

    async fn fetch_reserve(
        &self,
        cfg: &'static AssetConfig,
        pool: Address,
        data_provider: Address,
        oracle_addr: Address,
    ) -> Result<Option<ReserveView>, LendingError> {
        let asset = parse_evm_address(cfg.address)?;

        let out = self
            .call(pool, IPool::getReserveDataCall { asset }.abi_encode())
            .await?;
        let reserve = IPool::getReserveDataCall::abi_decode_returns(&out)
            .map_err(|e| LendingError::DecodeFailed(format!("pool reserve data: {e}")))?;
        let flags = decode::decode_reserve_config_bitmap(reserve.configuration);
        if !flags.is_active || flags.is_paused {
            debug!(symbol = cfg.symbol, "reserve inactive or paused; skipping");
            return Ok(None);
        }

        // The data provider carries the aggregate totals; without them the
        // reserve has no usable snapshot, so the asset is dropped like any
        // other per-asset failure.
        let totals_out = self
            .call(
                data_provider,
                IPoolDataProvider::getReserveDataCall { asset }.abi_encode(),
            )
            .await?;
        let totals = IPoolDataProvider::getReserveDataCall::abi_decode_returns(&totals_out)
            .map_err(|e| LendingError::DecodeFailed(format!("provider reserve data: {e}")))?;

        let liquidity_rate_ray = u256_to_u128(totals.liquidityRate, "liquidity rate")?;
        let borrow_rate_ray = u256_to_u128(totals.variableBorrowRate, "borrow rate")?;
        let total_supplied = totals.totalAToken;
        let total_debt = totals.totalStableDebt + totals.totalVariableDebt;

        let utilization =
            decode::calculate_utilization(&total_debt.to_string(), &total_supplied.to_string())?;
        let price_usd = self.reserve_price_usd(cfg, oracle_addr).await;

        Ok(Some(ReserveView {
            cfg,
            liquidity_rate_ray,
            borrow_rate_ray,
            total_supplied,
            total_debt,
            utilization,
            price_usd,
        }))
    }

    /// All configured reserves for this market. Individual asset failures
    /// are skipped; zero successes with at least one failure is a market
    /// failure.
    async fn reserves(&self) -> Result<Vec<ReserveView>, LendingError> {
        let pool = parse_evm_address(self.addresses.pool)?;
        let data_provider = parse_evm_address(self.addresses.data_provider)?;
        let oracle_addr = parse_evm_address(self.addresses.oracle)?;

        let assets = self.registry.assets_for(self.protocol, self.chain);
        let mut views = Vec::with_capacity(assets.len());
        let mut failures = 0_usize;
        for cfg in assets {
            match self
                .fetch_reserve(cfg, pool, data_provider, oracle_addr)
                .await
            {
                Ok(Some(v)) => views.push(v),
                Ok(None) => {}
                Err(e) => {
                    warn!(symbol = cfg.symbol, error = %e, "reserve fetch failed");
                    failures += 1;
                }
            }
        }
        if views.is_empty() && failures > 0 {
            return Err(LendingError::query_failed(
                self.chain,
                self.protocol,
                format!("all {failures} reserve queries failed"),
            ));
        }
        Ok(views)
    }

    fn rate_from_view(&self, v: &ReserveView, ts: i64) -> Result<LendingRate, LendingError> {
        let total_supply = v.total_supplied.to_string();
        let total_borrow = v.total_debt.to_string();
        Ok(LendingRate {
            asset: asset_model(v.cfg, self.chain),
            chain: self.chain,
            protocol: self.protocol,
            supply_apy: decode::calculate_apy(v.liquidity_rate_ray),
            borrow_apy: decode::calculate_apy(v.borrow_rate_ray),
            supply_apr: decode::ray_to_percentage(v.liquidity_rate_ray),
            borrow_apr: decode::ray_to_percentage(v.borrow_rate_ray),
            utilization_rate: v.utilization,
            total_supply_usd: financial_math::token_base_to_usd(
                &total_supply,
                v.cfg.decimals,
                v.price_usd,
            )?,
            total_borrow_usd: financial_math::token_base_to_usd(
                &total_borrow,
                v.cfg.decimals,
                v.price_usd,
            )?,
            total_supply,
            total_borrow,
            timestamp: ts,
        })
    }

    pub async fn market_rates(&self) -> Result<Vec<LendingRate>, LendingError> {
        let ts = now_ms();
        let views = self.reserves().await?;
        views.iter().map(|v| self.rate_from_view(v, ts)).collect()
    }

    async fn account_health_for(&self, user: Address) -> Result<AccountHealthInputs, LendingError> {
        let pool = parse_evm_address(self.addresses.pool)?;
        let out = self
            .call(pool, IPool::getUserAccountDataCall { user }.abi_encode())
            .await?;
        let r = IPool::getUserAccountDataCall::abi_decode_returns(&out)
            .map_err(|e| LendingError::DecodeFailed(format!("user account data: {e}")))?;
        Ok(AccountHealthInputs {
            collateral_usd: financial_math::scaled_to_f64(
                u256_to_u128(r.totalCollateralBase, "collateral")?,
                BASE_CURRENCY_DECIMALS,
            ),
            debt_usd: financial_math::scaled_to_f64(
                u256_to_u128(r.totalDebtBase, "debt")?,
                BASE_CURRENCY_DECIMALS,
            ),
            liquidation_threshold_pct: decode::bps_to_percentage(u64::try_from(
                r.currentLiquidationThreshold,
            )
            .map_err(|_| {
                LendingError::DecodeFailed("liquidation threshold out of range".into())
            })?),
        })
    }

    pub async fn account_health(&self, wallet: &str) -> Result<AccountHealthInputs, LendingError> {
        let user = parse_evm_address(wallet)?;
        self.account_health_for(user).await
    }

    pub async fn user_positions(
        &self,
        wallet: &str,
    ) -> Result<
        (
            Vec<UserSupplyPosition>,
            Vec<UserBorrowPosition>,
            AccountHealthInputs,
        ),
        LendingError,
    > {
        let user = parse_evm_address(wallet)?;
        let health = self.account_health_for(user).await?;
        let hf = decode::calculate_health_factor(
            health.collateral_usd,
            health.debt_usd,
            health.liquidation_threshold_pct,
        );
        let views = self.reserves().await?;
        let data_provider = parse_evm_address(self.addresses.data_provider)?;

        let mut supplies = Vec::new();
        let mut borrows = Vec::new();
        for v in &views {
            let asset = parse_evm_address(v.cfg.address)?;
            let calldata = IPoolDataProvider::getUserReserveDataCall { asset, user }.abi_encode();
            let out = match self.call(data_provider, calldata).await {
                Ok(out) => out,
                Err(e) => {
                    warn!(symbol = v.cfg.symbol, error = %e, "user reserve query failed");
                    continue;
                }
            };
            let r = IPoolDataProvider::getUserReserveDataCall::abi_decode_returns(&out)
                .map_err(|e| LendingError::DecodeFailed(format!("user reserve data: {e}")))?;

            if !r.currentATokenBalance.is_zero() {
                let supplied = r.currentATokenBalance.to_string();
                supplies.push(UserSupplyPosition {
                    asset: asset_model(v.cfg, self.chain),
                    chain: self.chain,
                    protocol: self.protocol,
                    supplied_amount_usd: financial_math::token_base_to_usd(
                        &supplied,
                        v.cfg.decimals,
                        v.price_usd,
                    )?,
                    supplied_amount: supplied,
                    current_apy: decode::calculate_apy(v.liquidity_rate_ray),
                    accrued_interest: "0".to_owned(),
                    accrued_interest_usd: 0.0,
                });
            }

            let total_debt = r.currentStableDebt + r.currentVariableDebt;
            if !total_debt.is_zero() {
                let borrowed = total_debt.to_string();
                // Only the stable leg exposes its principal, so accrued
                // interest is tracked for that leg alone.
                let accrued = r
                    .currentStableDebt
                    .saturating_sub(r.principalStableDebt)
                    .to_string();
                borrows.push(UserBorrowPosition {
                    asset: asset_model(v.cfg, self.chain),
                    chain: self.chain,
                    protocol: self.protocol,
                    borrowed_amount_usd: financial_math::token_base_to_usd(
                        &borrowed,
                        v.cfg.decimals,
                        v.price_usd,
                    )?,
                    borrowed_amount: borrowed,
                    current_apy: decode::calculate_apy(v.borrow_rate_ray),
                    accrued_interest_usd: financial_math::token_base_to_usd(
                        &accrued,
                        v.cfg.decimals,
                        v.price_usd,
                    )?,
                    accrued_interest: accrued,
                    health_factor: hf.is_finite().then_some(hf),
                });
            }
        }
        Ok((supplies, borrows, health))
    }
}
