//! Reasoning capability implementations for npcrelay.
//!
//! All providers implement the `npcrelay_core::Provider` trait.
//! [`build_from_config`] picks one based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
