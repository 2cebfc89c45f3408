//! Deterministic numeric and binary conversion: fixed-point rate formats
//! (ray, bps), native-unit amount formatting, reserve-configuration bitmaps
//! and raw account-buffer reads. No I/O anywhere in this module.

#![expect(
    clippy::cast_precision_loss,
    clippy::float_arithmetic,
    reason = "dedicated numeric-conversion module; rate/percentage math is float by contract"
)]

use crate::errors::LendingError;
use alloy::primitives::U256;

/// Aave-style fixed-point scale: 1 ray = 10^27.
pub const RAY: f64 = 1e27;
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Convert a ray-scaled rate into a percentage: `(ray / 10^27) * 100`.
pub fn ray_to_percentage(ray: u128) -> f64 {
    (ray as f64 / RAY) * 100.0
}

/// Compound a ray-scaled per-second rate over one year and return the APY
/// as a percentage.
///
/// Uses `ln_1p`/`exp_m1` so the huge exponent stays numerically stable;
/// the result is still a float approximation of the protocol's integer
/// index math, which is accepted for display purposes.
pub fn calculate_apy(rate_per_second_ray: u128) -> f64 {
    let rate = rate_per_second_ray as f64 / RAY;
    let per_second = rate / SECONDS_PER_YEAR;
    (SECONDS_PER_YEAR * per_second.ln_1p()).exp_m1() * 100.0
}

/// Aave reports thresholds/LTV in basis points: 8250 -> 82.5.
pub fn bps_to_percentage(bps: u64) -> f64 {
    bps as f64 / 100.0
}

/// Compound a simple annual rate at per-second granularity.
pub fn apr_to_apy(apr_pct: f64) -> f64 {
    let r = apr_pct / 100.0;
    (SECONDS_PER_YEAR * (r / SECONDS_PER_YEAR).ln_1p()).exp_m1() * 100.0
}

/// Two-segment interest rate curve in whole percents, the account-model
/// protocol's reserve configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCurve {
    pub min_borrow_rate: u8,
    pub optimal_borrow_rate: u8,
    pub max_borrow_rate: u8,
    /// Utilization percentage where the kink sits.
    pub optimal_utilization: u8,
}

/// Borrow APR (percent) at a given utilization: linear from min to optimal
/// below the kink, optimal to max above it.
pub fn borrow_apr_from_curve(curve: &RateCurve, utilization_pct: f64) -> f64 {
    let optimal_util = f64::from(curve.optimal_utilization);
    let min = f64::from(curve.min_borrow_rate);
    let optimal = f64::from(curve.optimal_borrow_rate);
    let max = f64::from(curve.max_borrow_rate);

    if optimal_util > 0.0 && utilization_pct <= optimal_util {
        min + (utilization_pct / optimal_util) * (optimal - min)
    } else if optimal_util < 100.0 {
        let over = (utilization_pct - optimal_util).max(0.0);
        optimal + (over / (100.0 - optimal_util)) * (max - optimal)
    } else {
        optimal
    }
}

/// Suppliers earn the borrow rate scaled by how much of the pool is lent out.
pub fn supply_apr_from_borrow(borrow_apr_pct: f64, utilization_pct: f64) -> f64 {
    borrow_apr_pct * utilization_pct / 100.0
}

/// Divide an integer native-unit amount by `10^decimals`, producing a
/// decimal string. Pure integer/string math; trailing zeros are trimmed.
pub fn format_units(amount: &str, decimals: u32) -> Result<String, LendingError> {
    let base: u128 = amount
        .trim()
        .parse()
        .map_err(|_| LendingError::DecodeFailed(format!("invalid integer amount: {amount}")))?;
    if decimals == 0 {
        return Ok(base.to_string());
    }
    let scale = 10_u128
        .checked_pow(decimals)
        .ok_or_else(|| LendingError::DecodeFailed(format!("decimals too large: {decimals}")))?;
    let whole = base / scale;
    let frac = base % scale;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let mut frac_s = format!("{frac:0width$}", width = decimals as usize);
    while frac_s.ends_with('0') {
        frac_s.pop();
    }
    Ok(format!("{whole}.{frac_s}"))
}

/// Inverse of [`format_units`]: decimal string -> integer native units.
pub fn parse_units(amount: &str, decimals: u32) -> Result<String, LendingError> {
    let s = amount.trim();
    if s.is_empty() {
        return Err(LendingError::DecodeFailed("empty amount".into()));
    }
    let (whole, frac) = match s.split_once('.') {
        Some((a, b)) => (a, b),
        None => (s, ""),
    };
    if whole.starts_with('-') {
        return Err(LendingError::DecodeFailed("amount must be non-negative".into()));
    }
    if frac.len() > decimals as usize {
        return Err(LendingError::DecodeFailed(format!(
            "too many decimal places for token (decimals={decimals})"
        )));
    }
    let whole_v: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| LendingError::DecodeFailed(format!("invalid amount: {amount}")))?
    };
    let mut frac_s = frac.to_owned();
    while frac_s.len() < decimals as usize {
        frac_s.push('0');
    }
    let frac_v: u128 = if frac_s.is_empty() {
        0
    } else {
        frac_s
            .parse()
            .map_err(|_| LendingError::DecodeFailed(format!("invalid amount: {amount}")))?
    };
    let scale = 10_u128
        .checked_pow(decimals)
        .ok_or_else(|| LendingError::DecodeFailed(format!("decimals too large: {decimals}")))?;
    let base = whole_v
        .checked_mul(scale)
        .and_then(|x| x.checked_add(frac_v))
        .ok_or_else(|| LendingError::DecodeFailed("amount overflow".into()))?;
    Ok(base.to_string())
}

pub fn parse_u256_dec(s: &str) -> Result<U256, LendingError> {
    s.trim()
        .parse::<U256>()
        .map_err(|_| LendingError::DecodeFailed(format!("invalid integer amount: {s}")))
}

// Fixed-point scale for the utilization intermediate; keeps ~12 decimal
// digits of the ratio before the final float conversion.
const UTILIZATION_SCALE: u64 = 1_000_000_000_000;

/// `total_borrow / total_supply * 100`, or 0 when supply is zero.
///
/// Amounts are string-encoded native units that can exceed the 53-bit safe
/// integer range, so the division runs through `U256` and only the final
/// scaled ratio is converted to a float.
pub fn calculate_utilization(total_borrow: &str, total_supply: &str) -> Result<f64, LendingError> {
    let borrow = parse_u256_dec(total_borrow)?;
    let supply = parse_u256_dec(total_supply)?;
    if supply.is_zero() {
        return Ok(0.0);
    }
    let scaled = borrow
        .checked_mul(U256::from(100_u64))
        .and_then(|v| v.checked_mul(U256::from(UTILIZATION_SCALE)))
        .ok_or_else(|| LendingError::DecodeFailed("utilization overflow".into()))?
        / supply;
    let scaled: u128 = scaled
        .try_into()
        .map_err(|_| LendingError::DecodeFailed("utilization out of range".into()))?;
    Ok(scaled as f64 / UTILIZATION_SCALE as f64)
}

/// `(collateral * threshold% / 100) / debt`; infinite when there is no debt
/// (a position with no debt cannot be liquidated).
pub fn calculate_health_factor(
    collateral_value: f64,
    debt_value: f64,
    liquidation_threshold_pct: f64,
) -> f64 {
    if debt_value == 0.0 {
        return f64::INFINITY;
    }
    (collateral_value * liquidation_threshold_pct / 100.0) / debt_value
}

/// Decoded Aave reserve-configuration bitmap.
///
/// Bit layout (protocol-defined; a change upstream is a compatibility
/// break, not a bug here):
/// bits 0-15 LTV, 16-31 liquidation threshold, 32-47 liquidation bonus,
/// 48-55 decimals, 56 active, 57 frozen, 58 borrowing enabled, 59 stable
/// borrowing enabled, 60 paused, 64-79 reserve factor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveConfigFlags {
    pub ltv: f64,
    pub liquidation_threshold: f64,
    pub liquidation_bonus: f64,
    pub decimals: u32,
    pub is_active: bool,
    pub is_frozen: bool,
    pub borrowing_enabled: bool,
    pub stable_borrowing_enabled: bool,
    pub is_paused: bool,
    pub reserve_factor: f64,
}

fn bitmap_bits(bitmap: U256, start: usize, len: usize) -> u64 {
    let mask = (U256::from(1_u64) << len) - U256::from(1_u64);
    let v = (bitmap >> start) & mask;
    v.try_into().unwrap_or(u64::MAX)
}

fn bitmap_bit(bitmap: U256, position: usize) -> bool {
    bitmap.bit(position)
}

pub fn decode_reserve_config_bitmap(bitmap: U256) -> ReserveConfigFlags {
    const LIQUIDATION_THRESHOLD_START: usize = 16;
    const LIQUIDATION_BONUS_START: usize = 32;
    const DECIMALS_START: usize = 48;
    const ACTIVE_BIT: usize = 56;
    const FROZEN_BIT: usize = 57;
    const BORROWING_BIT: usize = 58;
    const STABLE_BORROWING_BIT: usize = 59;
    const PAUSED_BIT: usize = 60;
    const RESERVE_FACTOR_START: usize = 64;

    ReserveConfigFlags {
        ltv: bitmap_bits(bitmap, 0, 16) as f64 / 100.0,
        liquidation_threshold: bitmap_bits(bitmap, LIQUIDATION_THRESHOLD_START, 16) as f64 / 100.0,
        liquidation_bonus: bitmap_bits(bitmap, LIQUIDATION_BONUS_START, 16) as f64 / 100.0,
        decimals: u32::try_from(bitmap_bits(bitmap, DECIMALS_START, 8)).unwrap_or(0),
        is_active: bitmap_bit(bitmap, ACTIVE_BIT),
        is_frozen: bitmap_bit(bitmap, FROZEN_BIT),
        borrowing_enabled: bitmap_bit(bitmap, BORROWING_BIT),
        stable_borrowing_enabled: bitmap_bit(bitmap, STABLE_BORROWING_BIT),
        is_paused: bitmap_bit(bitmap, PAUSED_BIT),
        reserve_factor: bitmap_bits(bitmap, RESERVE_FACTOR_START, 16) as f64 / 100.0,
    }
}

/// Bounds-checked little-endian reader over raw account bytes.
///
/// Every read that would run past the buffer fails with `DecodeFailed`;
/// fixed-layout parsers never fall back to zeroed defaults.
#[derive(Debug)]
pub struct AccountCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountCursor<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub const fn position(&self) -> usize {
        self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LendingError> {
        let end = self.offset.checked_add(len).ok_or_else(|| {
            LendingError::DecodeFailed("account cursor offset overflow".into())
        })?;
        let bytes = self.data.get(self.offset..end).ok_or_else(|| {
            LendingError::DecodeFailed(format!(
                "account data too short: need {len} bytes at offset {}, have {}",
                self.offset,
                self.data.len()
            ))
        })?;
        self.offset = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), LendingError> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, LendingError> {
        let b = self.take(1)?;
        Ok(b.first().copied().unwrap_or_default())
    }

    pub fn read_bool(&mut self) -> Result<bool, LendingError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, LendingError> {
        let b = self.take(2)?;
        let arr: [u8; 2] = b
            .try_into()
            .map_err(|_| LendingError::DecodeFailed("u16 read".into()))?;
        Ok(u16::from_le_bytes(arr))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, LendingError> {
        let b = self.take(4)?;
        let arr: [u8; 4] = b
            .try_into()
            .map_err(|_| LendingError::DecodeFailed("u32 read".into()))?;
        Ok(u32::from_le_bytes(arr))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, LendingError> {
        let b = self.take(8)?;
        let arr: [u8; 8] = b
            .try_into()
            .map_err(|_| LendingError::DecodeFailed("u64 read".into()))?;
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_u128_le(&mut self) -> Result<u128, LendingError> {
        let b = self.take(16)?;
        let arr: [u8; 16] = b
            .try_into()
            .map_err(|_| LendingError::DecodeFailed("u128 read".into()))?;
        Ok(u128::from_le_bytes(arr))
    }

    /// 32-byte public key, returned base58-encoded.
    pub fn read_pubkey(&mut self) -> Result<String, LendingError> {
        let b = self.take(32)?;
        Ok(bs58::encode(b).into_string())
    }
}
