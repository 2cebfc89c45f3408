//! Account-model Solana lending protocol (Solend layout): reserve and
//! obligation state is stored as flat byte buffers in program-owned
//! accounts, read with the bounds-checked cursor and fixed v1 schemas.

use crate::adapters::{asset_model, AccountHealthInputs};
use crate::decode::{self, AccountCursor, RateCurve};
use crate::errors::LendingError;
use crate::financial_math;
use crate::model::{now_ms, LendingRate, UserBorrowPosition, UserSupplyPosition};
use crate::oracle::PriceOracle;
use crate::provider::ChainDataProvider;
use crate::registry::{AccountModelAddresses, AssetConfig, Chain, Protocol, Registry};
use alloy::primitives::U256;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr as _;
use std::sync::Arc;
use tracing::{debug, warn};

pub const RESERVE_VERSION: u8 = 1;
pub const OBLIGATION_VERSION: u8 = 1;

/// Wad fixed point: 10^18.
const WAD: u128 = 1_000_000_000_000_000_000;

/// Reserve account, v1 schema.
///
/// Byte layout (little-endian, offsets fixed by the on-chain program):
/// version u8, last-update slot u64 + stale u8, lending market pubkey,
/// liquidity (mint pubkey, decimals u8, supply vault pubkey, two oracle
/// pubkeys, available u64, borrowed wads u128, cumulative borrow rate wads
/// u128, market price wads u128), collateral (mint pubkey, total supply
/// u64, supply vault pubkey), then the config bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveAccount {
    pub version: u8,
    pub last_update_slot: u64,
    pub stale: bool,
    pub lending_market: String,
    pub liquidity_mint: String,
    pub mint_decimals: u8,
    pub available_amount: u64,
    pub borrowed_amount_wads: u128,
    pub cumulative_borrow_rate_wads: u128,
    /// USD price of one whole token, wad fixed point.
    pub market_price_wads: u128,
    pub collateral_mint: String,
    pub collateral_total_supply: u64,
    pub curve: RateCurve,
    pub loan_to_value: u8,
    pub liquidation_bonus: u8,
    pub liquidation_threshold: u8,
}

pub fn parse_reserve(data: &[u8]) -> Result<ReserveAccount, LendingError> {
    let mut c = AccountCursor::new(data);
    let version = c.read_u8()?;
    if version != RESERVE_VERSION {
        return Err(LendingError::DecodeFailed(format!(
            "unsupported reserve version {version}"
        )));
    }
    let last_update_slot = c.read_u64_le()?;
    let stale = c.read_bool()?;
    let lending_market = c.read_pubkey()?;

    let liquidity_mint = c.read_pubkey()?;
    let mint_decimals = c.read_u8()?;
    c.skip(32)?; // liquidity supply vault
    c.skip(32)?; // pyth oracle
    c.skip(32)?; // switchboard oracle
    let available_amount = c.read_u64_le()?;
    let borrowed_amount_wads = c.read_u128_le()?;
    let cumulative_borrow_rate_wads = c.read_u128_le()?;
    let market_price_wads = c.read_u128_le()?;

    let collateral_mint = c.read_pubkey()?;
    let collateral_total_supply = c.read_u64_le()?;
    c.skip(32)?; // collateral supply vault

    let optimal_utilization = c.read_u8()?;
    let loan_to_value = c.read_u8()?;
    let liquidation_bonus = c.read_u8()?;
    let liquidation_threshold = c.read_u8()?;
    let min_borrow_rate = c.read_u8()?;
    let optimal_borrow_rate = c.read_u8()?;
    let max_borrow_rate = c.read_u8()?;

    Ok(ReserveAccount {
        version,
        last_update_slot,
        stale,
        lending_market,
        liquidity_mint,
        mint_decimals,
        available_amount,
        borrowed_amount_wads,
        cumulative_borrow_rate_wads,
        market_price_wads,
        collateral_mint,
        collateral_total_supply,
        curve: RateCurve {
            min_borrow_rate,
            optimal_borrow_rate,
            max_borrow_rate,
            optimal_utilization,
        },
        loan_to_value,
        liquidation_bonus,
        liquidation_threshold,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationCollateral {
    pub deposit_reserve: String,
    /// Collateral token units.
    pub deposited_amount: u64,
    /// USD value at last refresh, wad fixed point.
    pub market_value_wads: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationLiquidity {
    pub borrow_reserve: String,
    pub cumulative_borrow_rate_wads: u128,
    /// Owed amount including accrued interest, wad fixed point.
    pub borrowed_amount_wads: u128,
    pub market_value_wads: u128,
}

/// Obligation account, v1 schema: the per-wallet position record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationAccount {
    pub version: u8,
    pub last_update_slot: u64,
    pub stale: bool,
    pub lending_market: String,
    pub owner: String,
    pub deposited_value_wads: u128,
    pub borrowed_value_wads: u128,
    pub allowed_borrow_value_wads: u128,
    pub unhealthy_borrow_value_wads: u128,
    pub deposits: Vec<ObligationCollateral>,
    pub borrows: Vec<ObligationLiquidity>,
}

pub fn parse_obligation(data: &[u8]) -> Result<ObligationAccount, LendingError> {
    let mut c = AccountCursor::new(data);
    let version = c.read_u8()?;
    if version != OBLIGATION_VERSION {
        return Err(LendingError::DecodeFailed(format!(
            "unsupported obligation version {version}"
        )));
    }
    let last_update_slot = c.read_u64_le()?;
    let stale = c.read_bool()?;
    let lending_market = c.read_pubkey()?;
    let owner = c.read_pubkey()?;
    let deposited_value_wads = c.read_u128_le()?;
    let borrowed_value_wads = c.read_u128_le()?;
    let allowed_borrow_value_wads = c.read_u128_le()?;
    let unhealthy_borrow_value_wads = c.read_u128_le()?;
    c.skip(64)?; // reserved

    let deposits_len = c.read_u8()?;
    let borrows_len = c.read_u8()?;

    let mut deposits = Vec::with_capacity(usize::from(deposits_len));
    for _ in 0..deposits_len {
        deposits.push(ObligationCollateral {
            deposit_reserve: c.read_pubkey()?,
            deposited_amount: c.read_u64_le()?,
            market_value_wads: c.read_u128_le()?,
        });
    }
    let mut borrows = Vec::with_capacity(usize::from(borrows_len));
    for _ in 0..borrows_len {
        borrows.push(ObligationLiquidity {
            borrow_reserve: c.read_pubkey()?,
            cumulative_borrow_rate_wads: c.read_u128_le()?,
            borrowed_amount_wads: c.read_u128_le()?,
            market_value_wads: c.read_u128_le()?,
        });
    }

    Ok(ObligationAccount {
        version,
        last_update_slot,
        stale,
        lending_market,
        owner,
        deposited_value_wads,
        borrowed_value_wads,
        allowed_borrow_value_wads,
        unhealthy_borrow_value_wads,
        deposits,
        borrows,
    })
}

fn parse_pubkey(s: &str) -> Result<Pubkey, LendingError> {
    Pubkey::from_str(s.trim()).map_err(|_| LendingError::InvalidAddress(s.to_owned()))
}

/// The wallet's obligation account address for one lending market: derived
/// with the market address (base58, truncated to the 32-char seed limit) as
/// the seed.
pub fn obligation_address(
    wallet: &Pubkey,
    market: &str,
    program: &Pubkey,
) -> Result<Pubkey, LendingError> {
    let seed = market.get(..32).unwrap_or(market);
    Pubkey::create_with_seed(wallet, seed, program)
        .map_err(|e| LendingError::InvalidAddress(format!("obligation seed: {e}")))
}

/// Interest accrued since the position was opened, in wads. The principal
/// is recovered by rolling the entry's cumulative rate forward to the
/// reserve's current one.
fn accrued_interest_wads(borrowed_wads: u128, entry_cum: u128, reserve_cum: u128) -> u128 {
    if entry_cum == 0 || reserve_cum == 0 || entry_cum >= reserve_cum {
        return 0;
    }
    let principal =
        U256::from(borrowed_wads) * U256::from(entry_cum) / U256::from(reserve_cum);
    U256::from(borrowed_wads)
        .saturating_sub(principal)
        .try_into()
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
struct ReserveView {
    cfg: &'static AssetConfig,
    reserve: ReserveAccount,
    decimals: u32,
    utilization: f64,
    borrow_apr: f64,
    supply_apr: f64,
    price_usd: f64,
    total_supply: u128,
    total_borrow: u128,
}

pub struct AccountModelAdapter<P, O> {
    provider: Arc<P>,
    oracle: Arc<O>,
    registry: Registry,
    protocol: Protocol,
    chain: Chain,
    addresses: &'static AccountModelAddresses,
}

impl<P: ChainDataProvider, O: PriceOracle> AccountModelAdapter<P, O> {
    pub fn new(
        provider: Arc<P>,
        oracle: Arc<O>,
        registry: Registry,
        protocol: Protocol,
        chain: Chain,
    ) -> Result<Self, LendingError> {
        let addresses = registry
            .account_model_addresses(protocol, chain)
            .ok_or_else(|| {
                LendingError::query_failed(chain, protocol, "no market deployment configured")
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

    async fn fetch_reserve(
        &self,
        cfg: &'static AssetConfig,
        reserve_address: &str,
    ) -> Result<ReserveView, LendingError> {
        let key = parse_pubkey(reserve_address)?;
        let data = self
            .provider
            .account_data(key)
            .await
            .map_err(|e| LendingError::query_failed(self.chain, self.protocol, format!("{e:#}")))?;
        let reserve = parse_reserve(&data)?;

        if reserve.liquidity_mint != cfg.address {
            return Err(LendingError::DecodeFailed(format!(
                "reserve {reserve_address} holds mint {} but {} was expected",
                reserve.liquidity_mint, cfg.address
            )));
        }
        if reserve.stale {
            debug!(symbol = cfg.symbol, "reserve marked stale; using last refreshed state");
        }
        let decimals = u32::from(reserve.mint_decimals);
        if decimals != cfg.decimals {
            warn!(
                symbol = cfg.symbol,
                on_chain = decimals,
                configured = cfg.decimals,
                "decimals mismatch; trusting on-chain value"
            );
        }

        let total_borrow = reserve.borrowed_amount_wads / WAD;
        let total_supply = u128::from(reserve.available_amount).saturating_add(total_borrow);
        let utilization =
            decode::calculate_utilization(&total_borrow.to_string(), &total_supply.to_string())?;
        let borrow_apr = decode::borrow_apr_from_curve(&reserve.curve, utilization);
        let supply_apr = decode::supply_apr_from_borrow(borrow_apr, utilization);

        let price_usd = if reserve.market_price_wads == 0 {
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
        } else {
            financial_math::wad_to_f64(reserve.market_price_wads)
        };

        Ok(ReserveView {
            cfg,
            reserve,
            decimals,
            utilization,
            borrow_apr,
            supply_apr,
            price_usd,
            total_supply,
            total_borrow,
        })
    }

    async fn reserves(&self) -> Result<Vec<ReserveView>, LendingError> {
        let mut views = Vec::with_capacity(self.addresses.reserves.len());
        let mut failures = 0_usize;
        for (symbol, reserve_address) in self.addresses.reserves {
            let Some(cfg) = self.registry.find_asset(symbol, self.protocol, self.chain) else {
                warn!(symbol, "reserve configured without a matching asset");
                continue;
            };
            match self.fetch_reserve(cfg, reserve_address).await {
                Ok(v) => views.push(v),
                Err(e) => {
                    warn!(symbol, error = %e, "reserve fetch failed");
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
        let total_supply = v.total_supply.to_string();
        let total_borrow = v.total_borrow.to_string();
        Ok(LendingRate {
            asset: asset_model(v.cfg, self.chain),
            chain: self.chain,
            protocol: self.protocol,
            supply_apy: decode::apr_to_apy(v.supply_apr),
            borrow_apy: decode::apr_to_apy(v.borrow_apr),
            supply_apr: v.supply_apr,
            borrow_apr: v.borrow_apr,
            utilization_rate: v.utilization,
            total_supply_usd: financial_math::token_base_to_usd(
                &total_supply,
                v.decimals,
                v.price_usd,
            )?,
            total_borrow_usd: financial_math::token_base_to_usd(
                &total_borrow,
                v.decimals,
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

    /// The wallet's obligation, or `None` when the account does not exist
    /// (a wallet that never used the market).
    async fn fetch_obligation(
        &self,
        wallet: &Pubkey,
    ) -> Result<Option<ObligationAccount>, LendingError> {
        let program = parse_pubkey(self.addresses.program_id)?;
        let address = obligation_address(wallet, self.addresses.main_market, &program)?;
        let data = match self.provider.account_data(address).await {
            Ok(data) => data,
            Err(e) => {
                debug!(%address, error = %e, "no obligation account");
                return Ok(None);
            }
        };
        let obligation = parse_obligation(&data)?;
        if obligation.owner != wallet.to_string() {
            return Err(LendingError::DecodeFailed(format!(
                "obligation {address} owned by {}, expected {wallet}",
                obligation.owner
            )));
        }
        Ok(Some(obligation))
    }

    fn health_from_obligation(obligation: &ObligationAccount) -> AccountHealthInputs {
        let collateral_usd = financial_math::wad_to_f64(obligation.deposited_value_wads);
        let debt_usd = financial_math::wad_to_f64(obligation.borrowed_value_wads);
        AccountHealthInputs {
            collateral_usd,
            debt_usd,
            liquidation_threshold_pct: financial_math::ratio_pct(
                financial_math::wad_to_f64(obligation.unhealthy_borrow_value_wads),
                collateral_usd,
            ),
        }
    }

    pub async fn account_health(&self, wallet: &str) -> Result<AccountHealthInputs, LendingError> {
        let wallet = parse_pubkey(wallet)?;
        Ok(self
            .fetch_obligation(&wallet)
            .await?
            .as_ref()
            .map(Self::health_from_obligation)
            .unwrap_or_default())
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
        let wallet = parse_pubkey(wallet)?;
        let Some(obligation) = self.fetch_obligation(&wallet).await? else {
            return Ok((Vec::new(), Vec::new(), AccountHealthInputs::default()));
        };
        let health = Self::health_from_obligation(&obligation);
        let hf = decode::calculate_health_factor(
            health.collateral_usd,
            health.debt_usd,
            health.liquidation_threshold_pct,
        );
        let views = self.reserves().await?;
        let view_for = |reserve_addr: &str| {
            self.registry
                .symbol_for_reserve(self.protocol, self.chain, reserve_addr)
                .and_then(|symbol| views.iter().find(|v| v.cfg.symbol == symbol))
        };

        let mut supplies = Vec::new();
        for d in &obligation.deposits {
            let Some(v) = view_for(&d.deposit_reserve) else {
                warn!(reserve = %d.deposit_reserve, "deposit against unknown reserve; skipping");
                continue;
            };
            supplies.push(UserSupplyPosition {
                asset: asset_model(v.cfg, self.chain),
                chain: self.chain,
                protocol: self.protocol,
                supplied_amount: d.deposited_amount.to_string(),
                supplied_amount_usd: financial_math::wad_to_f64(d.market_value_wads),
                current_apy: decode::apr_to_apy(v.supply_apr),
                accrued_interest: "0".to_owned(),
                accrued_interest_usd: 0.0,
            });
        }

        let mut borrows = Vec::new();
        for b in &obligation.borrows {
            let Some(v) = view_for(&b.borrow_reserve) else {
                warn!(reserve = %b.borrow_reserve, "borrow against unknown reserve; skipping");
                continue;
            };
            let accrued_wads = accrued_interest_wads(
                b.borrowed_amount_wads,
                b.cumulative_borrow_rate_wads,
                v.reserve.cumulative_borrow_rate_wads,
            );
            let accrued = (accrued_wads / WAD).to_string();
            borrows.push(UserBorrowPosition {
                asset: asset_model(v.cfg, self.chain),
                chain: self.chain,
                protocol: self.protocol,
                borrowed_amount: (b.borrowed_amount_wads / WAD).to_string(),
                borrowed_amount_usd: financial_math::wad_to_f64(b.market_value_wads),
                current_apy: decode::apr_to_apy(v.borrow_apr),
                accrued_interest_usd: financial_math::token_base_to_usd(
                    &accrued,
                    v.decimals,
                    v.price_usd,
                )?,
                accrued_interest: accrued,
                health_factor: hf.is_finite().then_some(hf),
            });
        }

        Ok((supplies, borrows, health))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StaticPriceOracle;
    use crate::testutil::{
        obligation_bytes, reserve_bytes, sol_reserve_pubkey, sol_reserve_spec, MockChain, WAD,
    };

    const TOL: f64 = 1e-6;

    fn adapter(chain: MockChain) -> eyre::Result<AccountModelAdapter<MockChain, StaticPriceOracle>> {
        Ok(AccountModelAdapter::new(
            Arc::new(chain),
            Arc::new(StaticPriceOracle::default()),
            Registry::new(),
            Protocol::Solend,
            Chain::Solana,
        )?)
    }

    #[test]
    fn reserve_round_trips_through_schema() -> eyre::Result<()> {
        let spec = sol_reserve_spec()?;
        let parsed = parse_reserve(&reserve_bytes(&spec))?;
        assert_eq!(parsed.version, RESERVE_VERSION);
        assert_eq!(parsed.last_update_slot, 1234);
        assert!(!parsed.stale);
        assert_eq!(parsed.mint_decimals, 9);
        assert_eq!(parsed.available_amount, spec.available);
        assert_eq!(parsed.borrowed_amount_wads, spec.borrowed_wads);
        assert_eq!(parsed.market_price_wads, spec.price_wads);
        assert_eq!(parsed.curve, spec.curve);
        assert_eq!(parsed.liquidation_threshold, 85);
        Ok(())
    }

    #[test]
    fn wrong_version_and_short_buffer_fail_decode() {
        let mut bad_version = vec![2_u8];
        bad_version.extend_from_slice(&[0_u8; 400]);
        assert!(
            matches!(parse_reserve(&bad_version), Err(LendingError::DecodeFailed(_))),
            "future schema versions must be rejected"
        );
        let truncated = vec![RESERVE_VERSION, 0, 0, 0];
        assert!(
            matches!(parse_reserve(&truncated), Err(LendingError::DecodeFailed(_))),
            "truncated buffers must fail, not zero-fill"
        );
    }

    #[tokio::test]
    async fn market_rates_from_reserve_account() -> eyre::Result<()> {
        let spec = sol_reserve_spec()?;
        let chain = MockChain::new().with_account(sol_reserve_pubkey()?, reserve_bytes(&spec));
        let a = adapter(chain)?;
        let rates = a.market_rates().await?;
        assert_eq!(rates.len(), 1, "only the SOL reserve is mocked");
        let r = &rates[0];
        assert_eq!(r.asset.symbol, "SOL");
        // 2 borrowed of 4 total.
        assert!((r.utilization_rate - 50.0).abs() < TOL, "got {}", r.utilization_rate);
        // Curve: 50/80 of the way to the 10% kink.
        assert!((r.borrow_apr - 6.25).abs() < TOL, "got {}", r.borrow_apr);
        assert!((r.supply_apr - 3.125).abs() < TOL, "got {}", r.supply_apr);
        assert!(r.borrow_apy > r.borrow_apr, "apy compounds above apr");
        assert_eq!(r.total_supply, "4000000000");
        assert_eq!(r.total_borrow, "2000000000");
        // 4 SOL at $100.
        assert!((r.total_supply_usd - 400.0).abs() < TOL, "got {}", r.total_supply_usd);
        assert!((r.total_borrow_usd - 200.0).abs() < TOL, "got {}", r.total_borrow_usd);
        Ok(())
    }

    #[tokio::test]
    async fn mint_mismatch_is_a_decode_failure_not_a_rate() -> eyre::Result<()> {
        let mut spec = sol_reserve_spec()?;
        spec.mint = Pubkey::new_unique();
        let chain = MockChain::new().with_account(sol_reserve_pubkey()?, reserve_bytes(&spec));
        let a = adapter(chain)?;
        // The one mocked reserve fails its mint check, the rest are absent.
        let r = a.market_rates().await;
        assert!(
            matches!(r, Err(LendingError::QueryFailed { .. })),
            "all-failed market must surface as query failure, got {r:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn positions_join_obligation_to_reserves() -> eyre::Result<()> {
        let spec = sol_reserve_spec()?;
        let reserve_key = sol_reserve_pubkey()?;
        let wallet = Pubkey::new_unique();
        let reg = Registry::new();
        let addrs = reg
            .account_model_addresses(Protocol::Solend, Chain::Solana)
            .ok_or_else(|| eyre::eyre!("solend deployment missing"))?;
        let program = parse_pubkey(addrs.program_id)?;
        let obligation_key = obligation_address(&wallet, addrs.main_market, &program)?;

        // 10 SOL deposited ($1000), 2 SOL borrowed ($200); borrow entry's
        // cumulative rate is half the reserve's, so half the debt is accrued
        // interest.
        let obligation = obligation_bytes(
            &spec.market,
            &wallet,
            1000 * WAD,
            200 * WAD,
            850 * WAD,
            &[(reserve_key, 10_000_000_000, 1000 * WAD)],
            &[(reserve_key, WAD / 2, 2_000_000_000 * WAD, 200 * WAD)],
        );
        let chain = MockChain::new()
            .with_account(reserve_key, reserve_bytes(&spec))
            .with_account(obligation_key, obligation);
        let a = adapter(chain)?;

        let (supplies, borrows, health) = a.user_positions(&wallet.to_string()).await?;
        assert_eq!(supplies.len(), 1);
        assert_eq!(supplies[0].supplied_amount, "10000000000");
        assert!((supplies[0].supplied_amount_usd - 1000.0).abs() < TOL);

        assert_eq!(borrows.len(), 1);
        assert_eq!(borrows[0].borrowed_amount, "2000000000");
        assert!((borrows[0].borrowed_amount_usd - 200.0).abs() < TOL);
        assert_eq!(borrows[0].accrued_interest, "1000000000", "half is interest");
        assert!((borrows[0].accrued_interest_usd - 100.0).abs() < TOL);
        let hf = borrows[0]
            .health_factor
            .ok_or_else(|| eyre::eyre!("borrow position must carry a health factor"))?;
        // 1000 * 85% / 200.
        assert!((hf - 4.25).abs() < TOL, "got {hf}");

        assert!((health.collateral_usd - 1000.0).abs() < TOL);
        assert!((health.debt_usd - 200.0).abs() < TOL);
        assert!((health.liquidation_threshold_pct - 85.0).abs() < TOL);
        Ok(())
    }

    #[tokio::test]
    async fn missing_obligation_means_empty_positions() -> eyre::Result<()> {
        let spec = sol_reserve_spec()?;
        let chain = MockChain::new().with_account(sol_reserve_pubkey()?, reserve_bytes(&spec));
        let a = adapter(chain)?;
        let wallet = Pubkey::new_unique().to_string();
        let (supplies, borrows, health) = a.user_positions(&wallet).await?;
        assert!(supplies.is_empty() && borrows.is_empty(), "no obligation, no positions");
        assert!(health.collateral_usd.abs() < TOL && health.debt_usd.abs() < TOL);
        Ok(())
    }

    #[test]
    fn accrued_interest_handles_degenerate_rates() {
        assert_eq!(accrued_interest_wads(100, 0, WAD), 0, "zero entry rate");
        assert_eq!(accrued_interest_wads(100, WAD, WAD), 0, "no rate movement");
        assert_eq!(
            accrued_interest_wads(100 * WAD, WAD, 2 * WAD),
            50 * WAD,
            "doubled cumulative rate means half is interest"
        );
    }
}
