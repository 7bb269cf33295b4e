//! Turn events and the frames they become on the wire.
//!
//! The reasoning loop produces [`AgentEvent`]s; the relay turns each one
//! into a [`ServerFrame`], the JSON shape clients actually read:
//!
//! - `{"type":"agent","content":...}`  reasoning or final answer
//! - `{"type":"tools","content":...}`  tool observation
//! - `{"type":"error","content":...}`  per-turn failure
//! - `{"type":"status","content":...}` lifecycle notice
//! - `{"type":"pong"}`                 heartbeat reply

use serde::{Deserialize, Serialize};

/// Events emitted by the reasoning loop, in production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Reasoning text or the final answer.
    AgentMessage { text: String },

    /// Observation returned by a tool.
    ToolInvocation { text: String },

    /// The turn failed; carries a human-readable reason.
    ErrorEvent { message: String },
}

impl AgentEvent {
    pub fn agent(text: impl Into<String>) -> Self {
        Self::AgentMessage { text: text.into() }
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::ToolInvocation { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::ErrorEvent {
            message: message.into(),
        }
    }
}

/// Outbound frame on a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Agent { content: String },
    Tools { content: String },
    Error { content: String },
    Status { content: String },
    Pong,
}

impl ServerFrame {
    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::Status {
            content: content.into(),
        }
    }

    /// Frame type tag, for logs.
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::Agent { .. } => "agent",
            Self::Tools { .. } => "tools",
            Self::Error { .. } => "error",
            Self::Status { .. } => "status",
            Self::Pong => "pong",
        }
    }

    pub fn to_json(&self) -> String {
        // Every variant is a plain string map; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.into())
    }
}

impl From<&AgentEvent> for ServerFrame {
    fn from(event: &AgentEvent) -> Self {
        match event {
            AgentEvent::AgentMessage { text } => Self::Agent {
                content: text.clone(),
            },
            AgentEvent::ToolInvocation { text } => Self::Tools {
                content: text.clone(),
            },
            AgentEvent::ErrorEvent { message } => Self::Error {
                content: message.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_event_maps_to_agent_frame() {
        let frame = ServerFrame::from(&AgentEvent::agent("4"));
        assert_eq!(frame.to_json(), r#"{"type":"agent","content":"4"}"#);
    }

    #[test]
    fn tool_event_maps_to_tools_frame() {
        let frame = ServerFrame::from(&AgentEvent::tool("Balance of eth: 1"));
        assert_eq!(frame.frame_type(), "tools");
        assert!(frame.to_json().contains(r#""type":"tools""#));
    }

    #[test]
    fn error_event_maps_to_error_frame() {
        let frame = ServerFrame::from(&AgentEvent::error("boom"));
        assert_eq!(frame.to_json(), r#"{"type":"error","content":"boom"}"#);
    }

    #[test]
    fn pong_frame_has_no_content() {
        assert_eq!(ServerFrame::Pong.to_json(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn status_frame_round_trip() {
        let frame = ServerFrame::status("Starting autonomous mode...");
        let parsed: ServerFrame = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(parsed, frame);
    }
}
