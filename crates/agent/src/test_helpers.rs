//! Shared test helpers: scripted providers, a lookup tool and recording sinks.

use crate::context::AgentContext;
use crate::relay::EventSink;
use crate::stream_event::ServerFrame;
use async_trait::async_trait;
use npcrelay_core::error::{ProviderError, ToolError, TransportError};
use npcrelay_core::message::{Message, MessageToolCall};
use npcrelay_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use npcrelay_core::tool::{Tool, ToolRegistry, ToolResult};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue; once the
/// script runs out every call fails.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    call_count: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        let responses = self.responses.lock().unwrap();
        responses.get(n).cloned().ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "script exhausted (call #{n}, have {})",
                responses.len()
            ))
        })
    }
}

/// A provider that requests the same tool on every call.
pub struct AlwaysToolProvider {
    tool: String,
    call_count: AtomicUsize,
}

impl AlwaysToolProvider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(make_tool_call_response(
            vec![MessageToolCall {
                id: format!("call_{n}"),
                name: self.tool.clone(),
                arguments: format!(r#"{{"key":"{n}"}}"#),
            }],
            "",
        ))
    }
}

/// A provider that answers only when the test releases a permit.
pub struct GatedProvider {
    gate: Arc<Semaphore>,
    answer: String,
    call_count: AtomicUsize,
}

impl GatedProvider {
    pub fn new(answer: &str) -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            answer: answer.to_string(),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Let `n` pending or future calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        permit.forget();
        Ok(make_text_response(&self.answer))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: None,
        model: "mock-model".into(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// Deterministic tool: `{"key": k}` → `"obs:k"`.
pub struct LookupTool;

#[async_trait]
impl Tool for LookupTool {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Look up a key"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "key": { "type": "string" } },
            "required": ["key"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let key = arguments["key"].as_str().unwrap_or_default();
        Ok(ToolResult::ok(format!("obs:{key}")))
    }
}

pub fn lookup_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(LookupTool));
    registry
}

/// Context over a scripted provider and the lookup tool.
pub fn test_context(script: Vec<ProviderResponse>) -> Arc<AgentContext> {
    Arc::new(AgentContext::new(
        Arc::new(SequentialMockProvider::new(script)),
        Arc::new(lookup_registry()),
    ))
}

/// Sink that records every frame.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<ServerFrame>>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<ServerFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_types(&self) -> Vec<&'static str> {
        self.frames().iter().map(ServerFrame::frame_type).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, frame: ServerFrame) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

/// Sink that accepts `ok` frames and fails every send after that.
pub struct FailingSink {
    ok: usize,
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn after(ok: usize) -> Self {
        Self {
            ok,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for FailingSink {
    async fn send(&self, _frame: ServerFrame) -> Result<(), TransportError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.ok {
            Ok(())
        } else {
            Err(TransportError::new("client went away"))
        }
    }
}
