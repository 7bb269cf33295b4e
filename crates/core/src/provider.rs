//! The reasoning capability behind every agent turn.
//!
//! One `complete` call is one reasoning step: the model sees the framed
//! history and the tool catalogue, then answers or asks for tools.

use crate::error::ProviderError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a single reasoning step needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,

    /// System framing first, then the session history in order.
    pub messages: Vec<Message>,

    #[serde(default = "ProviderRequest::default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Offered to the model as callable functions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    const fn default_temperature() -> f32 {
        0.7
    }
}

/// How a tool is advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object for the call arguments.
    pub parameters: serde_json::Value,
}

/// The outcome of one reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Assistant message; non-empty `tool_calls` means the step wants tools.
    pub message: Message,
    pub usage: Option<Usage>,
    /// Model name as reported by the backend.
    pub model: String,
}

impl ProviderResponse {
    pub fn wants_tools(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A model backend.
///
/// Shared as `Arc<dyn Provider>` across sessions, so implementations must
/// tolerate concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Backends without a cheap liveness check report healthy.
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
