use crate::registry::{Chain, Protocol};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured error suitable for the response envelope returned to API callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiErrorBody {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum LendingError {
    #[error("unknown chain: {0}")]
    InvalidChain(String),

    #[error("unknown protocol: {0}")]
    InvalidProtocol(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The adapter could not retrieve any data from its chain/protocol.
    /// Distinct from `DecodeFailed`: this is a transport-level outcome.
    #[error("query failed for {protocol} on {chain}: {reason}")]
    QueryFailed {
        chain: Chain,
        protocol: Protocol,
        reason: String,
    },

    /// Raw on-chain bytes did not match the expected schema. Indicates a
    /// protocol layout mismatch (version drift), not a transport failure.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The top-level fan-out produced zero usable results across all
    /// requested sources.
    #[error("aggregation produced no data: {0}")]
    AggregationFailed(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl LendingError {
    pub fn query_failed(chain: Chain, protocol: Protocol, reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            chain,
            protocol,
            reason: reason.into(),
        }
    }
}

impl From<LendingError> for ApiErrorBody {
    fn from(e: LendingError) -> Self {
        let message = e.to_string();
        match e {
            LendingError::InvalidChain(_) => Self::new("invalid_chain", message),
            LendingError::InvalidProtocol(_) => Self::new("invalid_protocol", message),
            LendingError::InvalidAddress(_) => Self::new("invalid_address", message),
            LendingError::QueryFailed { .. } => Self::new("query_failed", message),
            LendingError::DecodeFailed(_) => Self::new("decode_failed", message),
            LendingError::AggregationFailed(_) => Self::new("aggregation_failed", message),
            LendingError::NotFound(_) => Self::new("not_found", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let cases: Vec<(LendingError, &'static str)> = vec![
            (LendingError::InvalidChain("x".into()), "invalid_chain"),
            (LendingError::InvalidProtocol("x".into()), "invalid_protocol"),
            (LendingError::InvalidAddress("x".into()), "invalid_address"),
            (
                LendingError::query_failed(Chain::Ethereum, Protocol::Aave, "rpc down"),
                "query_failed",
            ),
            (LendingError::DecodeFailed("short".into()), "decode_failed"),
            (
                LendingError::AggregationFailed("all failed".into()),
                "aggregation_failed",
            ),
            (LendingError::NotFound("usdc".into()), "not_found"),
        ];
        for (err, code) in cases {
            let body = ApiErrorBody::from(err);
            assert_eq!(body.code, code, "unexpected code for {}", body.message);
        }
    }

    #[test]
    fn query_failed_carries_source_context() {
        let e = LendingError::query_failed(Chain::Solana, Protocol::Solend, "timeout");
        let msg = e.to_string();
        assert!(msg.contains("solend"), "message should name protocol: {msg}");
        assert!(msg.contains("solana"), "message should name chain: {msg}");
    }
}
