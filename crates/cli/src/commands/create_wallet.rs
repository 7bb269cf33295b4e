//! `npcrelay create-wallet`: provision a wallet and print it.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let wallets = npcrelay_tools::build_wallets(&config.wallet).await?;

    match wallets.provisioner.create_wallet().await {
        Ok(wallet) => {
            let out = serde_json::json!({
                "status": "success",
                "wallet_address": wallet.wallet_address,
                "wallet_id": wallet.wallet_id,
                "network": wallet.network,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Err(e) => Err(format!("Failed to create wallet: {e}").into()),
    }
}
