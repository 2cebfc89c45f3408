//! Float arithmetic for USD valuation and portfolio-level aggregates.
//!
//! Display math only: everything here happens after the integer-exact
//! decoding stage, on values that end up rounded in API output anyway.

#![expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "USD valuation is float by contract; exact integer math lives in decode"
)]

use crate::decode;
use crate::errors::LendingError;

/// Value a native-unit token amount in USD.
///
/// Goes through the string formatter rather than `amount as f64 / 10^d`
/// so amounts above 2^53 lose precision only once, at the final parse.
pub fn token_base_to_usd(
    amount: &str,
    decimals: u32,
    price_usd: f64,
) -> Result<f64, LendingError> {
    let ui = decode::format_units(amount, decimals)?;
    let qty: f64 = ui
        .parse()
        .map_err(|_| LendingError::DecodeFailed(format!("unformattable amount: {amount}")))?;
    Ok(qty * price_usd)
}

/// Wad (10^18 fixed point) to float. Solend obligations store aggregate
/// USD values in this scale.
pub fn wad_to_f64(wad: u128) -> f64 {
    wad as f64 / 1e18
}

/// Fixed-point integer to float: `value / 10^scale_decimals`. Aave's price
/// oracle and account totals use an 8-decimal base currency.
pub fn scaled_to_f64(value: u128, scale_decimals: u32) -> f64 {
    value as f64 / 10_f64.powi(scale_decimals.try_into().unwrap_or(i32::MAX))
}

pub fn sum(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().sum()
}

/// `numer / denom * 100`, or 0 when the denominator is zero.
pub fn ratio_pct(numer: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        return 0.0;
    }
    numer / denom * 100.0
}

/// Share of collateral value counted as borrowing capacity.
const BORROW_CAPACITY_RATIO: f64 = 0.8;

/// Remaining USD borrow headroom. Negative when the position is over its
/// capacity; callers surface that as-is rather than clamping.
pub fn available_to_borrow(collateral_usd: f64, debt_usd: f64) -> f64 {
    collateral_usd * BORROW_CAPACITY_RATIO - debt_usd
}

/// Annual USD interest flow of a set of positions, each a
/// `(usd_value, rate_pct)` pair.
pub fn annual_flow_usd(positions: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    positions
        .into_iter()
        .map(|(usd, rate_pct)| usd * rate_pct / 100.0)
        .sum()
}

/// USD still available to borrow from one market.
pub fn market_available_usd(supply_usd: f64, borrow_usd: f64) -> f64 {
    supply_usd - borrow_usd
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average of `rates` weighted by `weights`; falls back to the plain mean
/// when the total weight is zero (all-empty markets).
pub fn weighted_average(rates: &[f64], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return mean(rates);
    }
    rates
        .iter()
        .zip(weights.iter())
        .map(|(r, w)| r * w)
        .sum::<f64>()
        / total
}

/// Net portfolio yield: supply income minus borrow cost, as a percentage of
/// total supplied value. Zero when nothing is supplied.
pub fn net_apy(
    supplied_usd: f64,
    supply_income_usd_per_year: f64,
    borrow_cost_usd_per_year: f64,
) -> f64 {
    if supplied_usd == 0.0 {
        return 0.0;
    }
    (supply_income_usd_per_year - borrow_cost_usd_per_year) / supplied_usd * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn usd_valuation_uses_token_decimals() -> eyre::Result<()> {
        // 1.5 tokens at 6 decimals, $2 each.
        let v = token_base_to_usd("1500000", 6, 2.0)?;
        assert!((v - 3.0).abs() < TOL, "1.5 * $2 = $3, got {v}");
        Ok(())
    }

    #[test]
    fn usd_valuation_survives_large_amounts() -> eyre::Result<()> {
        // 10^24 base units at 18 decimals = 1e6 tokens.
        let v = token_base_to_usd("1000000000000000000000000", 18, 1.0)?;
        assert!((v - 1_000_000.0).abs() < 1e-3, "1e6 tokens at $1, got {v}");
        Ok(())
    }

    #[test]
    fn weighted_average_respects_weights() {
        let avg = weighted_average(&[2.0, 4.0], &[3.0, 1.0]);
        assert!((avg - 2.5).abs() < TOL, "(2*3 + 4*1)/4 = 2.5, got {avg}");
    }

    #[test]
    fn weighted_average_zero_weight_falls_back() {
        let avg = weighted_average(&[2.0, 4.0], &[0.0, 0.0]);
        assert!((avg - 3.0).abs() < TOL, "plain mean fallback, got {avg}");
        assert!(weighted_average(&[], &[]).abs() < TOL, "empty input is 0");
    }

    #[test]
    fn net_apy_subtracts_borrow_cost() {
        // $1000 supplied earning $50/yr, paying $20/yr on debt.
        let n = net_apy(1000.0, 50.0, 20.0);
        assert!((n - 3.0).abs() < TOL, "(50-20)/1000 = 3%, got {n}");
        assert!(net_apy(0.0, 0.0, 0.0).abs() < TOL, "no supply means 0");
    }

    #[test]
    fn wad_scale() {
        assert!((wad_to_f64(10_u128.pow(18)) - 1.0).abs() < TOL, "one wad is 1.0");
        // 8-decimal base currency, the oracle convention.
        assert!(
            (scaled_to_f64(250_000_000_000, 8) - 2500.0).abs() < TOL,
            "oracle price scale"
        );
    }

    #[test]
    fn borrow_headroom_is_unclamped() {
        let h = available_to_borrow(1000.0, 900.0);
        assert!((h - (-100.0)).abs() < TOL, "over-capacity stays negative, got {h}");
        let h = available_to_borrow(1000.0, 300.0);
        assert!((h - 500.0).abs() < TOL, "1000*0.8 - 300 = 500, got {h}");
    }
}
