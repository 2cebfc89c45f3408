//! USD spot prices for asset valuation.
//!
//! A missing price is not fatal: callers value the position at zero and
//! surface a warning, so one delisted ticker cannot sink a whole
//! aggregation pass.

use crate::config::{HttpConfig, LendlensConfig, OracleMode};
use eyre::Context as _;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Spot price lookup. `Ok(None)` means the source has no quote for the
/// symbol; `Err` means the source itself failed.
pub trait PriceOracle: Send + Sync + 'static {
    fn price_usd(&self, symbol: &str) -> impl Future<Output = eyre::Result<Option<f64>>> + Send;
}

fn is_stable_symbol(symbol: &str) -> bool {
    symbol.eq_ignore_ascii_case("USD")
        || symbol.eq_ignore_ascii_case("USDT")
        || symbol.eq_ignore_ascii_case("USDC")
        || symbol.eq_ignore_ascii_case("DAI")
}

/// Symbol aliases the ticker API quotes under a different name.
fn ticker_symbol(symbol: &str) -> String {
    let s = symbol.to_uppercase();
    match s.as_str() {
        "WBTC" => "BTC".to_owned(),
        "WETH" => "ETH".to_owned(),
        _ => s,
    }
}

#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    price: String,
}

/// Keyless Binance ticker lookup against `<base>/api/v3/ticker/price`.
#[derive(Debug, Clone)]
pub struct HttpPriceOracle {
    base_url: String,
    timeout: Duration,
}

impl HttpPriceOracle {
    pub fn new(http: &HttpConfig) -> Self {
        Self {
            base_url: http.binance_base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(http.timeout_seconds),
        }
    }
}

impl PriceOracle for HttpPriceOracle {
    async fn price_usd(&self, symbol: &str) -> eyre::Result<Option<f64>> {
        if is_stable_symbol(symbol) {
            return Ok(Some(1.0_f64));
        }
        let pair = format!("{}USDT", ticker_symbol(symbol));
        let url = format!("{}/api/v3/ticker/price?symbol={pair}", self.base_url);
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("build http client")?;
        let resp = client.get(url).send().await.context("ticker request")?;
        // An unknown pair comes back 4xx; that is "no quote", not an outage.
        if resp.status().is_client_error() {
            return Ok(None);
        }
        let v: BinanceTickerPrice = resp
            .error_for_status()
            .context("ticker status")?
            .json()
            .await
            .context("ticker json")?;
        let p: f64 = v.price.parse().context("parse ticker price")?;
        Ok(Some(p))
    }
}

/// Fixed price table from `[prices]` in the config file. Offline runs and
/// deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: BTreeMap<String, f64>,
}

impl StaticPriceOracle {
    pub fn new(prices: BTreeMap<String, f64>) -> Self {
        let prices = prices
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Self { prices }
    }
}

impl PriceOracle for StaticPriceOracle {
    async fn price_usd(&self, symbol: &str) -> eyre::Result<Option<f64>> {
        if let Some(p) = self.prices.get(&symbol.to_uppercase()) {
            return Ok(Some(*p));
        }
        if is_stable_symbol(symbol) {
            return Ok(Some(1.0_f64));
        }
        Ok(None)
    }
}

/// The oracle the config asks for.
#[derive(Debug, Clone)]
pub enum ConfiguredOracle {
    Http(HttpPriceOracle),
    Static(StaticPriceOracle),
}

impl ConfiguredOracle {
    pub fn from_config(cfg: &LendlensConfig) -> Self {
        match cfg.oracle {
            OracleMode::Http => Self::Http(HttpPriceOracle::new(&cfg.http)),
            OracleMode::Static => Self::Static(StaticPriceOracle::new(cfg.prices.clone())),
        }
    }
}

impl PriceOracle for ConfiguredOracle {
    async fn price_usd(&self, symbol: &str) -> eyre::Result<Option<f64>> {
        match self {
            Self::Http(o) => o.price_usd(symbol).await,
            Self::Static(o) => o.price_usd(symbol).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_oracle_serves_table_and_stables() -> eyre::Result<()> {
        let mut table = BTreeMap::new();
        table.insert("eth".to_owned(), 2500.0);
        let oracle = StaticPriceOracle::new(table);

        assert_eq!(oracle.price_usd("ETH").await?, Some(2500.0), "table hit");
        assert_eq!(oracle.price_usd("eth").await?, Some(2500.0), "case-insensitive");
        assert_eq!(oracle.price_usd("USDC").await?, Some(1.0), "stablecoin default");
        assert_eq!(oracle.price_usd("SOL").await?, None, "unknown symbol");
        Ok(())
    }

    #[tokio::test]
    async fn http_oracle_short_circuits_stables() -> eyre::Result<()> {
        // Unroutable base URL proves no request is made for stables.
        let oracle = HttpPriceOracle::new(&HttpConfig {
            binance_base_url: "https://invalid.localdomain".into(),
            timeout_seconds: 1,
        });
        assert_eq!(oracle.price_usd("USDT").await?, Some(1.0));
        assert_eq!(oracle.price_usd("DAI").await?, Some(1.0));
        Ok(())
    }

    #[test]
    fn wrapped_assets_quote_under_underlying_ticker() {
        assert_eq!(ticker_symbol("WBTC"), "BTC");
        assert_eq!(ticker_symbol("wbtc"), "BTC");
        assert_eq!(ticker_symbol("SOL"), "SOL");
    }
}
