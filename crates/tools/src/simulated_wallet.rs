//! In-memory wallet collaborator.
//!
//! Deterministic stand-in for the wallet service: addresses and transaction
//! hashes are derived from counters, balances live in a map, and the name
//! registry is a plain lookup table. Used for offline runs and tests.

use async_trait::async_trait;
use npcrelay_core::error::WalletError;
use npcrelay_core::wallet::{
    AssetBalance, ProvisionedWallet, TxReceipt, WalletBackend, WalletDetails, WalletProvisioner,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Faucet drip per request, by asset.
const FAUCET_DRIPS: &[(&str, f64)] = &[("eth", 0.1), ("usdc", 1.0)];

const NATIVE_ASSET: &str = "eth";

pub struct SimulatedWallet {
    network: String,
    wallet_id: String,
    address: String,
    state: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    balances: HashMap<String, f64>,
    names: HashMap<String, String>,
    tx_counter: u64,
    wallets_created: u64,
}

impl SimulatedWallet {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            wallet_id: "sim-wallet-0".into(),
            address: derive_hex("agent-wallet", 40),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Seed a balance, e.g. to exercise transfers in tests.
    pub fn with_balance(self, asset_id: &str, amount: f64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.balances.insert(asset_id.to_lowercase(), amount);
        }
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimState>, WalletError> {
        self.state
            .lock()
            .map_err(|_| WalletError::Unreachable("simulated wallet state poisoned".into()))
    }

    fn receipt(&self, state: &mut SimState) -> TxReceipt {
        state.tx_counter += 1;
        let hash = derive_hex(&format!("tx-{}-{}", self.wallet_id, state.tx_counter), 64);
        TxReceipt {
            transaction_link: Some(format!("https://sepolia.basescan.org/tx/{hash}")),
            transaction_hash: hash,
        }
    }
}

#[async_trait]
impl WalletProvisioner for SimulatedWallet {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn create_wallet(&self) -> Result<ProvisionedWallet, WalletError> {
        let mut state = self.lock()?;
        state.wallets_created += 1;
        let n = state.wallets_created;
        Ok(ProvisionedWallet {
            wallet_id: format!("sim-wallet-{n}"),
            wallet_address: derive_hex(&format!("npc-wallet-{n}"), 40),
            network: self.network.clone(),
        })
    }
}

#[async_trait]
impl WalletBackend for SimulatedWallet {
    async fn details(&self) -> Result<WalletDetails, WalletError> {
        Ok(WalletDetails {
            wallet_id: self.wallet_id.clone(),
            default_address: self.address.clone(),
            network: self.network.clone(),
        })
    }

    async fn balance(&self, asset_id: &str) -> Result<AssetBalance, WalletError> {
        let state = self.lock()?;
        let asset_id = asset_id.to_lowercase();
        let amount = state.balances.get(&asset_id).copied().unwrap_or(0.0);
        Ok(AssetBalance {
            asset_id,
            amount: format_amount(amount),
        })
    }

    async fn request_faucet_funds(&self, asset_id: Option<&str>) -> Result<TxReceipt, WalletError> {
        if self.network != "base-sepolia" {
            return Err(WalletError::InvalidRequest(format!(
                "faucet is only available on base-sepolia, not {}",
                self.network
            )));
        }
        let asset_id = asset_id.unwrap_or(NATIVE_ASSET).to_lowercase();
        let drip = FAUCET_DRIPS
            .iter()
            .find(|(asset, _)| *asset == asset_id)
            .map(|(_, amount)| *amount)
            .ok_or_else(|| {
                WalletError::InvalidRequest(format!("faucet does not dispense '{asset_id}'"))
            })?;

        let mut state = self.lock()?;
        *state.balances.entry(asset_id).or_insert(0.0) += drip;
        Ok(self.receipt(&mut state))
    }

    async fn transfer(
        &self,
        amount: &str,
        asset_id: &str,
        destination: &str,
    ) -> Result<TxReceipt, WalletError> {
        let value: f64 = amount
            .trim()
            .parse()
            .map_err(|_| WalletError::InvalidRequest(format!("'{amount}' is not a valid amount")))?;
        if value <= 0.0 || !value.is_finite() {
            return Err(WalletError::InvalidRequest("amount must be positive".into()));
        }

        let mut state = self.lock()?;
        let recipient = if is_address(destination) {
            destination.to_string()
        } else {
            state.names.get(destination).cloned().ok_or_else(|| {
                WalletError::InvalidRequest(format!("unknown destination '{destination}'"))
            })?
        };
        tracing::debug!(%recipient, amount = value, asset_id, "Simulated transfer");

        let asset_id = asset_id.to_lowercase();
        let available = state.balances.get(&asset_id).copied().unwrap_or(0.0);
        if available < value {
            return Err(WalletError::InsufficientFunds {
                asset: asset_id,
                needed: format_amount(value),
                available: format_amount(available),
            });
        }
        state.balances.insert(asset_id, available - value);
        Ok(self.receipt(&mut state))
    }

    async fn register_name(&self, label: &str, owner: &str) -> Result<TxReceipt, WalletError> {
        if !is_address(owner) {
            return Err(WalletError::InvalidRequest(format!(
                "'{owner}' is not a valid owner address"
            )));
        }
        let mut state = self.lock()?;
        if state.names.contains_key(label) {
            return Err(WalletError::InvalidRequest(format!(
                "name '{label}' is already registered"
            )));
        }
        state.names.insert(label.to_string(), owner.to_string());
        Ok(self.receipt(&mut state))
    }

    async fn resolve_name(&self, label: &str) -> Result<Option<String>, WalletError> {
        Ok(self.lock()?.names.get(label).cloned())
    }
}

/// `0x` followed by 40 hex digits.
pub(crate) fn is_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn format_amount(amount: f64) -> String {
    let s = format!("{amount:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() { "0".into() } else { s.to_string() }
}

/// Deterministic `0x`-prefixed hex string of `digits` length derived from `seed`.
fn derive_hex(seed: &str, digits: usize) -> String {
    let mut out = String::with_capacity(digits + 2);
    out.push_str("0x");
    let mut round = 0u64;
    while out.len() < digits + 2 {
        let hash = seed.bytes().fold(0xcbf2_9ce4_8422_2325u64 ^ round, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });
        out.push_str(&format!("{hash:016x}"));
        round += 1;
    }
    out.truncate(digits + 2);
    out
}
