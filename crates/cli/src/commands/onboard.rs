//! `npcrelay onboard`: write a default config file.

use npcrelay_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    println!("npcrelay setup");
    println!("==============\n");

    if write_default(&path)? {
        println!("Created config: {}", path.display());
    } else {
        println!("Config already exists: {}", path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Set OPENAI_API_KEY (or [provider].api_key in the config)");
    println!("  2. For a real wallet, run the wallet service and set WALLET_SERVICE_URL,");
    println!("     CDP_API_KEY_NAME and CDP_API_KEY_PRIVATE_KEY");
    println!("  3. npcrelay serve");

    Ok(())
}

/// Write the default config unless one is already there. Returns whether it wrote.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_once_and_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path).unwrap());
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.gateway.port, 8000);

        std::fs::write(&path, "[gateway]\nport = 9100\n").unwrap();
        assert!(!write_default(&path).unwrap());
        assert_eq!(AppConfig::load_from(&path).unwrap().gateway.port, 9100);
    }
}
