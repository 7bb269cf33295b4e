//! Provider selection from configuration.

use crate::openai_compat::OpenAiCompatProvider;
use npcrelay_config::ProviderConfig;
use npcrelay_core::error::ProviderError;
use npcrelay_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured reasoning capability.
///
/// Every supported backend speaks the OpenAI chat-completions dialect, so
/// the provider name only selects a default base URL when `api_url` is left
/// at the OpenAI default.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().unwrap_or_default();
    if api_key.is_empty() && requires_api_key(&config.name) {
        tracing::warn!(
            provider = %config.name,
            "No API key configured; set OPENAI_API_KEY or provider.api_key"
        );
    }

    let base_url = if config.api_url == default_base_url("openai") {
        default_base_url(&config.name)
    } else {
        config.api_url.clone()
    };

    let provider = OpenAiCompatProvider::new(
        &config.name,
        base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

fn requires_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
