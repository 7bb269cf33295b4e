//! Built-in tools and wallet collaborators for npcrelay.
//!
//! Tools give the agent the ability to act: inspect and move funds in its
//! wallet, register names, and run (simulated) market analytics. Wallet
//! tools go through a [`WalletBackend`], either the HTTP wallet service or
//! the in-memory simulator.

pub mod http_wallet;
pub mod market_tools;
pub mod simulated_wallet;
pub mod wallet_tools;

use npcrelay_config::{WalletBackendKind, WalletConfig};
use npcrelay_core::error::WalletError;
use npcrelay_core::tool::ToolRegistry;
use npcrelay_core::wallet::{WalletBackend, WalletProvisioner};
use std::sync::Arc;

pub use http_wallet::HttpWalletService;
pub use simulated_wallet::SimulatedWallet;

/// Create the tool registry with every built-in tool bound to `wallet`.
pub fn default_registry(wallet: Arc<dyn WalletBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(wallet_tools::GetWalletDetailsTool::new(wallet.clone())));
    registry.register(Box::new(wallet_tools::GetBalanceTool::new(wallet.clone())));
    registry.register(Box::new(wallet_tools::RequestFaucetFundsTool::new(wallet.clone())));
    registry.register(Box::new(wallet_tools::TransferTool::new(wallet.clone())));
    registry.register(Box::new(wallet_tools::RegisterBasenameTool::new(wallet.clone())));
    registry.register(Box::new(wallet_tools::ResolveBasenameTool::new(wallet)));
    registry.register(Box::new(market_tools::PredictionBetTool));
    registry.register(Box::new(market_tools::TokenAnalysisTool));
    registry.register(Box::new(market_tools::TokenDiscoveryTool));
    registry
}

/// The configured wallet collaborator, in both of its roles.
pub struct Wallets {
    pub backend: Arc<dyn WalletBackend>,
    pub provisioner: Arc<dyn WalletProvisioner>,
}

/// Build the wallet collaborator selected by `config.backend`.
pub async fn build_wallets(config: &WalletConfig) -> Result<Wallets, WalletError> {
    match config.backend {
        WalletBackendKind::Simulated => {
            let wallet = Arc::new(SimulatedWallet::new(&config.network));
            Ok(Wallets {
                backend: wallet.clone(),
                provisioner: wallet,
            })
        }
        WalletBackendKind::Http => {
            let service = Arc::new(HttpWalletService::connect(config).await?);
            Ok(Wallets {
                backend: service.clone(),
                provisioner: service,
            })
        }
    }
}
