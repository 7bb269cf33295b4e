//! Wallet collaborator traits.
//!
//! Custody, transaction construction and signing live in an external wallet
//! service. The relay only sees these narrow interfaces: one for creating
//! wallets (used by the HTTP persona flow) and one for acting with the
//! agent's own wallet (used by the wallet tools).

use crate::error::WalletError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A freshly provisioned wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedWallet {
    pub wallet_id: String,
    pub wallet_address: String,
    pub network: String,
}

/// Snapshot of the agent wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletDetails {
    pub wallet_id: String,
    pub default_address: String,
    pub network: String,
}

/// Balance of one asset, as a decimal string to avoid float rounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset_id: String,
    pub amount: String,
}

/// Receipt for an on-chain action the wallet service broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_link: Option<String>,
}

/// Creates new wallets (one per NPC persona).
#[async_trait]
pub trait WalletProvisioner: Send + Sync {
    /// A human-readable name for this provisioner.
    fn name(&self) -> &str;

    async fn create_wallet(&self) -> Result<ProvisionedWallet, WalletError>;
}

/// Acts with the agent's own wallet.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    async fn details(&self) -> Result<WalletDetails, WalletError>;

    async fn balance(&self, asset_id: &str) -> Result<AssetBalance, WalletError>;

    /// Request testnet funds. `asset_id` of `None` means the native asset.
    async fn request_faucet_funds(&self, asset_id: Option<&str>) -> Result<TxReceipt, WalletError>;

    async fn transfer(
        &self,
        amount: &str,
        asset_id: &str,
        destination: &str,
    ) -> Result<TxReceipt, WalletError>;

    /// Register `label` on the name registry, owned by `owner`.
    async fn register_name(&self, label: &str, owner: &str) -> Result<TxReceipt, WalletError>;

    /// Resolve a registered label to its address, if any.
    async fn resolve_name(&self, label: &str) -> Result<Option<String>, WalletError>;
}
