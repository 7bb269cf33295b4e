//! # npcrelay core
//!
//! Domain types, collaborator traits, and error definitions for the npcrelay
//! agent relay. Reasoning, tools, wallet custody and persona persistence
//! are traits here; the other crates implement them, and tests swap in
//! scripted stand-ins.

pub mod error;
pub mod message;
pub mod persona;
pub mod provider;
pub mod tool;
pub mod wallet;

pub use error::{ProviderError, ToolError, TransportError, TurnError, WalletError};
pub use message::{Conversation, Message, MessageToolCall, Role, SessionId};
pub use persona::{NpcPersona, NpcRecord, PersonaStore, WalletInfo, compose_system_prompt};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
pub use wallet::{ProvisionedWallet, WalletBackend, WalletProvisioner};
