//! Configuration loading, validation, and management for npcrelay.
//!
//! Loads configuration from `~/.npcrelay/config.toml` (or an explicit path)
//! with `.env` and environment variable overrides. Validates all settings
//! at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.npcrelay/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning capability (LLM endpoint)
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reasoning loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Autonomous ("heartbeat") turns
    #[serde(default)]
    pub autonomous: AutonomousConfig,

    /// HTTP / WebSocket gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Wallet collaborator
    #[serde(default)]
    pub wallet: WalletConfig,

    /// Persona store
    #[serde(default)]
    pub persona: PersonaConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("agent", &self.agent)
            .field("autonomous", &self.autonomous)
            .field("gateway", &self.gateway)
            .field("wallet", &self.wallet)
            .field("persona", &self.persona)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL of an OpenAI-compatible `/chat/completions` API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (usually supplied via `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning steps (provider calls) per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_max_steps() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomousConfig {
    /// Seconds between autonomous turns
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Start every connection in autonomous mode
    #[serde(default)]
    pub enabled_by_default: bool,

    /// The synthetic input of an autonomous turn
    #[serde(default = "default_autonomous_prompt")]
    pub prompt: String,
}

fn default_interval_secs() -> u64 {
    10
}

pub fn default_autonomous_prompt() -> String {
    "Be creative and do something interesting on the blockchain. \
     Choose an action or set of actions and execute it that highlights your abilities."
        .into()
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            enabled_by_default: false,
            prompt: default_autonomous_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Which wallet collaborator to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletBackendKind {
    /// Deterministic in-process wallet, no network
    #[default]
    Simulated,
    /// REST wallet service that owns custody and signing
    Http,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub backend: WalletBackendKind,

    /// Base URL of the wallet service (required for `http`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    #[serde(default = "default_network")]
    pub network: String,

    /// Where the agent wallet's exported data is kept between restarts
    #[serde(default = "default_wallet_data_file")]
    pub data_file: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_private_key: Option<String>,
}

fn default_network() -> String {
    "base-sepolia".into()
}
fn default_wallet_data_file() -> PathBuf {
    PathBuf::from("wallet_data.txt")
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            backend: WalletBackendKind::default(),
            service_url: None,
            network: default_network(),
            data_file: default_wallet_data_file(),
            api_key_name: None,
            api_key_private_key: None,
        }
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("backend", &self.backend)
            .field("service_url", &self.service_url)
            .field("network", &self.network)
            .field("data_file", &self.data_file)
            .field("api_key_name", &self.api_key_name)
            .field("api_key_private_key", &redact(&self.api_key_private_key))
            .finish()
    }
}

/// Which persona store to persist into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaBackendKind {
    #[default]
    File,
    Postgres,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default)]
    pub backend: PersonaBackendKind,

    /// JSON document holding the active persona
    #[serde(default = "default_persona_file")]
    pub config_file: PathBuf,

    /// Postgres connection string (Supabase's database URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

fn default_persona_file() -> PathBuf {
    PathBuf::from("npc_config.json")
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            backend: PersonaBackendKind::default(),
            config_file: default_persona_file(),
            database_url: None,
        }
    }
}

impl std::fmt::Debug for PersonaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaConfig")
            .field("backend", &self.backend)
            .field("config_file", &self.config_file)
            .field("database_url", &redact(&self.database_url))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default location, applying `.env` and
    /// environment overrides.
    ///
    /// Environment variables consulted:
    /// - `NPCRELAY_API_KEY` / `OPENAI_API_KEY`
    /// - `NPCRELAY_MODEL`, `NPCRELAY_PORT`
    /// - `CDP_API_KEY_NAME`, `CDP_API_KEY_PRIVATE_KEY`, `WALLET_SERVICE_URL`
    /// - `SUPABASE_DB_URL` / `DATABASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`AppConfig::load`], reading from `path` when given.
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenv::dotenv();

        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"));
        let mut config = Self::read_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("NPCRELAY_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = lookup("NPCRELAY_MODEL") {
            self.provider.model = model;
        }
        if let Some(port) = lookup("NPCRELAY_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
        if let Some(name) = lookup("CDP_API_KEY_NAME") {
            self.wallet.api_key_name = Some(name);
        }
        if let Some(pk) = lookup("CDP_API_KEY_PRIVATE_KEY") {
            // Keys pasted into .env files carry literal "\n" sequences.
            self.wallet.api_key_private_key = Some(pk.replace("\\n", "\n"));
        }
        if let Some(url) = lookup("WALLET_SERVICE_URL") {
            self.wallet.service_url = Some(url);
            self.wallet.backend = WalletBackendKind::Http;
        }
        if let Some(url) = lookup("SUPABASE_DB_URL").or_else(|| lookup("DATABASE_URL")) {
            self.persona.database_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".npcrelay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.autonomous.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "autonomous.interval_secs must be at least 1".into(),
            ));
        }

        if self.wallet.backend == WalletBackendKind::Http && self.wallet.service_url.is_none() {
            return Err(ConfigError::ValidationError(
                "wallet.service_url is required when wallet.backend = \"http\"".into(),
            ));
        }

        if self.persona.backend == PersonaBackendKind::Postgres
            && self.persona.database_url.is_none()
        {
            return Err(ConfigError::ValidationError(
                "persona.database_url is required when persona.backend = \"postgres\"".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
