//! Chain access behind one trait so every engine can be driven either by
//! live RPC endpoints or by canned bytes in tests.

use alloy::{
    network::TransactionBuilder as _,
    primitives::{Address, Bytes},
    providers::{Provider as _, RootProvider},
    rpc::types::TransactionRequest,
};
use eyre::Context as _;
use reqwest::Client;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::future::Future;
use std::time::Duration;

use crate::config::RpcConfig;

const DEFAULT_RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only chain access used by the protocol adapters.
///
/// Both methods return raw bytes; decoding stays in the adapters so the
/// transport can be swapped out wholesale in tests.
pub trait ChainDataProvider: Send + Sync + 'static {
    /// `eth_call` against a contract; returns the raw ABI return data.
    fn evm_call(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> impl Future<Output = eyre::Result<Bytes>> + Send;

    /// Raw account data for a Solana account. Missing accounts are errors.
    fn account_data(&self, key: Pubkey) -> impl Future<Output = eyre::Result<Vec<u8>>> + Send;
}

/// Live implementation backed by one Ethereum JSON-RPC endpoint and one
/// Solana RPC endpoint. Clients are rebuilt per call; both stacks pool
/// connections internally and calls here are low-frequency.
#[derive(Debug, Clone)]
pub struct RpcChainData {
    ethereum_rpc_url: String,
    solana_rpc_url: String,
    timeout: Duration,
}

impl RpcChainData {
    pub fn new(rpc: &RpcConfig) -> Self {
        Self {
            ethereum_rpc_url: rpc.ethereum_rpc_url.clone(),
            solana_rpc_url: rpc.solana_rpc_url.clone(),
            timeout: Duration::from_secs(rpc.timeout_seconds),
        }
    }

    fn evm_provider(&self) -> eyre::Result<RootProvider> {
        let u: reqwest::Url = self
            .ethereum_rpc_url
            .parse()
            .with_context(|| format!("invalid rpc url: {}", self.ethereum_rpc_url))?;
        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(DEFAULT_RPC_CONNECT_TIMEOUT)
            .build()
            .context("build rpc http client")?;
        let http = alloy::transports::http::Http::with_client(client, u);
        let rpc_client = alloy::rpc::client::RpcClient::new(http, false);
        Ok(RootProvider::new(rpc_client))
    }

    fn solana_rpc(&self) -> RpcClient {
        RpcClient::new_with_timeout_and_commitment(
            self.solana_rpc_url.clone(),
            self.timeout,
            CommitmentConfig::confirmed(),
        )
    }
}

impl ChainDataProvider for RpcChainData {
    async fn evm_call(&self, to: Address, calldata: Bytes) -> eyre::Result<Bytes> {
        let p = self.evm_provider()?;
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata);
        let out = p.call(tx).await.context("eth_call")?;
        Ok(out)
    }

    async fn account_data(&self, key: Pubkey) -> eyre::Result<Vec<u8>> {
        let rpc = self.solana_rpc();
        let account = rpc.get_account(&key).await.context("get account")?;
        Ok(account.data)
    }
}
