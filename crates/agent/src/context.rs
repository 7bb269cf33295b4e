//! Immutable per-session agent context.
//!
//! An [`AgentContext`] bundles everything a turn needs from the outside
//! world. Sessions take an `Arc` snapshot when they open, so installing a
//! new persona only affects sessions opened afterwards.

use npcrelay_config::AppConfig;
use npcrelay_core::persona::{NpcPersona, compose_system_prompt};
use npcrelay_core::provider::Provider;
use npcrelay_core::tool::ToolRegistry;
use std::sync::Arc;

pub struct AgentContext {
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: String,
    /// Maximum provider calls per turn.
    pub max_steps: u32,
}

impl AgentContext {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            model: "gpt-4".into(),
            temperature: 0.7,
            max_tokens: None,
            system_prompt: compose_system_prompt(None),
            max_steps: 10,
        }
    }

    /// Build a context from configuration, framed by `persona` if given.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        persona: Option<&NpcPersona>,
    ) -> Self {
        Self {
            provider,
            tools,
            model: config.provider.model.clone(),
            temperature: config.provider.temperature,
            max_tokens: config.provider.max_tokens,
            system_prompt: compose_system_prompt(persona),
            max_steps: config.agent.max_steps,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// A copy of this context reframed for a different persona.
    pub fn reframed(&self, persona: Option<&NpcPersona>) -> Self {
        Self {
            provider: self.provider.clone(),
            tools: self.tools.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system_prompt: compose_system_prompt(persona),
            max_steps: self.max_steps,
        }
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.names())
            .field("model", &self.model)
            .field("max_steps", &self.max_steps)
            .finish()
    }
}
