pub mod chat;
pub mod create_wallet;
pub mod onboard;
pub mod serve;

use npcrelay_config::AppConfig;
use std::path::Path;

/// Load configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}"))?)
}
