//! `npcrelay serve`: start the HTTP / WebSocket gateway.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("npcrelay gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   WebSocket:  ws://{}:{}/ws", config.gateway.host, config.gateway.port);
    println!("   Model:      {}", config.provider.model);
    println!("   Wallet:     {:?} on {}", config.wallet.backend, config.wallet.network);

    npcrelay_gateway::start(config).await?;

    Ok(())
}
