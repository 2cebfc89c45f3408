//! Canned-response chain provider and account fixtures for unit tests.

use crate::adapters::account_model::{OBLIGATION_VERSION, RESERVE_VERSION};
use crate::decode::RateCurve;
use crate::provider::ChainDataProvider;
use crate::registry::{Chain, Protocol, Registry};
use alloy::primitives::{Address, Bytes};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr as _;

/// In-memory provider: EVM responses keyed by (contract, calldata), Solana
/// accounts keyed by pubkey. Unknown lookups fail like a dead RPC.
#[derive(Debug, Default)]
pub struct MockChain {
    evm: HashMap<(Address, Vec<u8>), Bytes>,
    accounts: HashMap<Pubkey, Vec<u8>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evm_return(mut self, to: Address, calldata: Vec<u8>, ret: Vec<u8>) -> Self {
        self.evm.insert((to, calldata), Bytes::from(ret));
        self
    }

    pub fn with_account(mut self, key: Pubkey, data: Vec<u8>) -> Self {
        self.accounts.insert(key, data);
        self
    }
}

impl ChainDataProvider for MockChain {
    async fn evm_call(&self, to: Address, calldata: Bytes) -> eyre::Result<Bytes> {
        self.evm
            .get(&(to, calldata.to_vec()))
            .cloned()
            .ok_or_else(|| eyre::eyre!("no canned response for call to {to}"))
    }

    async fn account_data(&self, key: Pubkey) -> eyre::Result<Vec<u8>> {
        self.accounts
            .get(&key)
            .cloned()
            .ok_or_else(|| eyre::eyre!("no canned account {key}"))
    }
}

pub const WAD: u128 = 1_000_000_000_000_000_000;

fn push_pubkey(buf: &mut Vec<u8>, key: &Pubkey) {
    buf.extend_from_slice(key.as_ref());
}

fn parse_pubkey(s: &str) -> eyre::Result<Pubkey> {
    Pubkey::from_str(s).map_err(|e| eyre::eyre!("bad fixture pubkey {s}: {e}"))
}

/// Everything needed to lay out one reserve account fixture.
pub struct ReserveSpec {
    pub market: Pubkey,
    pub mint: Pubkey,
    pub decimals: u8,
    pub available: u64,
    pub borrowed_wads: u128,
    pub cumulative_wads: u128,
    pub price_wads: u128,
    pub curve: RateCurve,
    pub liquidation_threshold: u8,
}

/// Serializes a `ReserveSpec` into v1 reserve account bytes.
pub fn reserve_bytes(spec: &ReserveSpec) -> Vec<u8> {
    let mut buf = vec![RESERVE_VERSION];
    buf.extend_from_slice(&1234_u64.to_le_bytes()); // slot
    buf.push(0); // stale
    push_pubkey(&mut buf, &spec.market);
    push_pubkey(&mut buf, &spec.mint);
    buf.push(spec.decimals);
    push_pubkey(&mut buf, &Pubkey::new_unique()); // supply vault
    push_pubkey(&mut buf, &Pubkey::new_unique()); // pyth
    push_pubkey(&mut buf, &Pubkey::new_unique()); // switchboard
    buf.extend_from_slice(&spec.available.to_le_bytes());
    buf.extend_from_slice(&spec.borrowed_wads.to_le_bytes());
    buf.extend_from_slice(&spec.cumulative_wads.to_le_bytes());
    buf.extend_from_slice(&spec.price_wads.to_le_bytes());
    push_pubkey(&mut buf, &Pubkey::new_unique()); // collateral mint
    buf.extend_from_slice(&0_u64.to_le_bytes()); // collateral supply
    push_pubkey(&mut buf, &Pubkey::new_unique()); // collateral vault
    buf.push(spec.curve.optimal_utilization);
    buf.push(75); // ltv
    buf.push(5); // liquidation bonus
    buf.push(spec.liquidation_threshold);
    buf.push(spec.curve.min_borrow_rate);
    buf.push(spec.curve.optimal_borrow_rate);
    buf.push(spec.curve.max_borrow_rate);
    buf
}

/// v1 obligation schema bytes. Deposit entries are (reserve, amount,
/// market value wads); borrow entries are (reserve, cumulative rate wads,
/// borrowed wads, market value wads).
pub fn obligation_bytes(
    market: &Pubkey,
    owner: &Pubkey,
    deposited_wads: u128,
    borrowed_wads: u128,
    unhealthy_wads: u128,
    deposits: &[(Pubkey, u64, u128)],
    borrows: &[(Pubkey, u128, u128, u128)],
) -> Vec<u8> {
    let mut buf = vec![OBLIGATION_VERSION];
    buf.extend_from_slice(&1234_u64.to_le_bytes());
    buf.push(0);
    push_pubkey(&mut buf, market);
    push_pubkey(&mut buf, owner);
    buf.extend_from_slice(&deposited_wads.to_le_bytes());
    buf.extend_from_slice(&borrowed_wads.to_le_bytes());
    buf.extend_from_slice(&(deposited_wads / 2).to_le_bytes()); // allowed
    buf.extend_from_slice(&unhealthy_wads.to_le_bytes());
    buf.extend_from_slice(&[0_u8; 64]);
    buf.push(u8::try_from(deposits.len()).unwrap_or(0));
    buf.push(u8::try_from(borrows.len()).unwrap_or(0));
    for (reserve, amount, value) in deposits {
        push_pubkey(&mut buf, reserve);
        buf.extend_from_slice(&amount.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    for (reserve, cum, amount, value) in borrows {
        push_pubkey(&mut buf, reserve);
        buf.extend_from_slice(&cum.to_le_bytes());
        buf.extend_from_slice(&amount.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

/// Healthy SOL reserve fixture: 2 SOL idle, 2 SOL borrowed, $100 price,
/// 0/10/30 curve with the kink at 80%.
pub fn sol_reserve_spec() -> eyre::Result<ReserveSpec> {
    let reg = Registry::new();
    let sol = reg
        .find_asset("SOL", Protocol::Solend, Chain::Solana)
        .ok_or_else(|| eyre::eyre!("sol not configured"))?;
    let market = parse_pubkey(
        reg.account_model_addresses(Protocol::Solend, Chain::Solana)
            .ok_or_else(|| eyre::eyre!("solend deployment missing"))?
            .main_market,
    )?;
    Ok(ReserveSpec {
        market,
        mint: parse_pubkey(sol.address)?,
        decimals: 9,
        available: 2_000_000_000,
        borrowed_wads: 2_000_000_000 * WAD,
        cumulative_wads: WAD,
        price_wads: 100 * WAD,
        curve: RateCurve {
            min_borrow_rate: 0,
            optimal_borrow_rate: 10,
            max_borrow_rate: 30,
            optimal_utilization: 80,
        },
        liquidation_threshold: 85,
    })
}

/// Account address of the configured SOL reserve.
pub fn sol_reserve_pubkey() -> eyre::Result<Pubkey> {
    let reg = Registry::new();
    parse_pubkey(
        reg.reserve_address(Protocol::Solend, Chain::Solana, "SOL")
            .ok_or_else(|| eyre::eyre!("sol reserve missing"))?,
    )
}
