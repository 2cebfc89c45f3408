use crate::errors::LendingError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const ETHEREUM_MAINNET_RPC_URL: &str = "https://eth.llamarpc.com";
pub const SOLANA_MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Ethereum JSON-RPC endpoint URL.
    pub ethereum_rpc_url: String,
    /// Solana RPC endpoint URL.
    pub solana_rpc_url: String,
    /// Per-request timeout applied to every RPC call (seconds).
    pub timeout_seconds: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            ethereum_rpc_url: ETHEREUM_MAINNET_RPC_URL.into(),
            solana_rpc_url: SOLANA_MAINNET_RPC_URL.into(),
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Binance public API base URL (keyless). Used for USD prices.
    pub binance_base_url: String,
    /// Per-request timeout for price lookups (seconds).
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            binance_base_url: "https://api.binance.com".into(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OracleMode {
    /// Fetch spot prices from the configured HTTP price API.
    #[default]
    Http,
    /// Serve prices from the `[prices]` table only. Offline operation and
    /// deterministic tests.
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LendlensConfig {
    pub rpc: RpcConfig,
    pub http: HttpConfig,
    pub oracle: OracleMode,
    /// Symbol -> USD price table consulted when `oracle = "static"`.
    pub prices: BTreeMap<String, f64>,
}

impl Default for LendlensConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            http: HttpConfig::default(),
            oracle: OracleMode::Http,
            prices: BTreeMap::new(),
        }
    }
}

impl LendlensConfig {
    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, LendingError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LendingError::NotFound(format!("config file {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| LendingError::DecodeFailed(format!("config parse: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_point_at_public_mainnet_endpoints() {
        let cfg = LendlensConfig::default();
        assert_eq!(cfg.rpc.solana_rpc_url, SOLANA_MAINNET_RPC_URL);
        assert_eq!(cfg.rpc.ethereum_rpc_url, ETHEREUM_MAINNET_RPC_URL);
        assert_eq!(cfg.oracle, OracleMode::Http);
        assert!(cfg.prices.is_empty(), "no static prices by default");
    }

    #[test]
    fn partial_toml_fills_in_defaults() -> eyre::Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        writeln!(
            f,
            r#"
oracle = "static"

[rpc]
ethereum_rpc_url = "http://localhost:8545"

[prices]
ETH = 2000.0
"#
        )?;
        let cfg = LendlensConfig::load(f.path())?;
        assert_eq!(cfg.oracle, OracleMode::Static);
        assert_eq!(cfg.rpc.ethereum_rpc_url, "http://localhost:8545");
        // Unspecified keys keep their defaults.
        assert_eq!(cfg.rpc.solana_rpc_url, SOLANA_MAINNET_RPC_URL);
        assert_eq!(cfg.rpc.timeout_seconds, 15);
        assert_eq!(cfg.prices.get("ETH").copied(), Some(2000.0));
        Ok(())
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let r = LendlensConfig::load(Path::new("/nonexistent/lendlens.toml"));
        assert!(
            matches!(r, Err(LendingError::NotFound(_))),
            "missing file should map to not_found, got {r:?}"
        );
    }
}
