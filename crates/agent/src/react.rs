//! Tool-augmented reasoning loop (ReAct: Thought → Action → Observation).
//!
//! Each step asks the provider for the next move given the system framing,
//! the session history and everything the turn has produced so far. A reply
//! without tool calls is the final answer; a reply with tool calls is
//! executed through the registry and its observations are fed back.
//!
//! Events go out over an mpsc channel in the order they are produced. All
//! provider and tool failures stop the loop here and become an
//! [`AgentEvent::ErrorEvent`]; nothing propagates to the caller.

use crate::context::AgentContext;
use crate::stream_event::AgentEvent;
use npcrelay_core::error::TurnError;
use npcrelay_core::message::{Message, MessageToolCall};
use npcrelay_core::provider::{ProviderRequest, ToolDefinition};
use npcrelay_core::tool::ToolCall;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Failed(FailureReason),
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    StepLimitExceeded { max_steps: u32 },
    ToolOrModelError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ClientDisconnected,
}

impl std::fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(FailureReason::StepLimitExceeded { max_steps }) => {
                write!(f, "failed(StepLimitExceeded {max_steps})")
            }
            Self::Failed(FailureReason::ToolOrModelError(_)) => write!(f, "failed(ToolOrModelError)"),
            Self::Aborted(AbortReason::ClientDisconnected) => write!(f, "aborted(ClientDisconnected)"),
        }
    }
}

impl TurnOutcome {
    /// `Ok` for a completed turn, the matching [`TurnError`] otherwise.
    pub fn into_result(self) -> Result<(), TurnError> {
        match self {
            Self::Completed => Ok(()),
            Self::Failed(reason) => Err(reason.into()),
            Self::Aborted(reason) => Err(reason.into()),
        }
    }
}

impl From<FailureReason> for TurnError {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::StepLimitExceeded { max_steps } => Self::StepLimitExceeded { max_steps },
            FailureReason::ToolOrModelError(message) => Self::ToolOrModel(message),
        }
    }
}

impl From<AbortReason> for TurnError {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::ClientDisconnected => Self::ClientDisconnected,
        }
    }
}

/// What one run of the loop left behind.
#[derive(Debug)]
pub struct LoopReport {
    pub outcome: TurnOutcome,
    /// Assistant and tool messages produced by the turn, in order.
    pub produced: Vec<Message>,
    /// Provider calls made.
    pub steps: u32,
}

pub struct ReasoningLoop {
    context: Arc<AgentContext>,
    steps_taken: Arc<AtomicU32>,
}

/// The receiver went away; stop producing.
struct Disconnected;

impl ReasoningLoop {
    pub fn new(context: Arc<AgentContext>) -> Self {
        Self {
            context,
            steps_taken: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Live count of provider calls, readable while the loop runs elsewhere.
    pub fn steps_taken(&self) -> Arc<AtomicU32> {
        self.steps_taken.clone()
    }

    /// Drive one turn to completion.
    pub async fn run(
        &self,
        history: Vec<Message>,
        input: Message,
        events: mpsc::Sender<AgentEvent>,
    ) -> LoopReport {
        let mut produced = Vec::new();
        let mut steps = 0u32;
        let outcome = match self
            .drive(&history, &input, &events, &mut produced, &mut steps)
            .await
        {
            Ok(outcome) => outcome,
            Err(Disconnected) => TurnOutcome::Aborted(AbortReason::ClientDisconnected),
        };
        LoopReport {
            outcome,
            produced,
            steps,
        }
    }

    async fn drive(
        &self,
        history: &[Message],
        input: &Message,
        events: &mpsc::Sender<AgentEvent>,
        produced: &mut Vec<Message>,
        steps: &mut u32,
    ) -> Result<TurnOutcome, Disconnected> {
        let ctx = &self.context;
        let tool_defs = ctx.tools.definitions();

        loop {
            if *steps >= ctx.max_steps {
                warn!(max_steps = ctx.max_steps, "Step limit reached without a final answer");
                let reason = FailureReason::StepLimitExceeded {
                    max_steps: ctx.max_steps,
                };
                return fail(events, reason).await;
            }
            *steps += 1;
            self.steps_taken.store(*steps, Ordering::Relaxed);
            debug!(step = *steps, "Reasoning step");

            let request = self.request(history, input, produced, &tool_defs);
            let response = match ctx.provider.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(step = *steps, error = %e, "Provider failed");
                    return fail(events, FailureReason::ToolOrModelError(e.to_string())).await;
                }
            };

            let message = response.message;
            if message.tool_calls.is_empty() {
                let answer = message.content.clone();
                produced.push(message);
                emit(events, AgentEvent::agent(answer)).await?;
                return Ok(TurnOutcome::Completed);
            }

            if !message.content.trim().is_empty() {
                emit(events, AgentEvent::agent(message.content.clone())).await?;
            }
            let calls = message.tool_calls.clone();
            produced.push(message);

            for (i, call) in calls.iter().enumerate() {
                match self.execute(call).await {
                    Ok(observation) => {
                        produced.push(Message::tool_result(&call.id, &observation));
                        emit(events, AgentEvent::tool(observation)).await?;
                    }
                    Err(reason) => {
                        warn!(tool = %call.name, error = %reason, "Tool failed");
                        // Keep the transcript well-formed: every call gets a reply.
                        produced.push(Message::tool_result(&call.id, format!("Error: {reason}")));
                        for skipped in &calls[i + 1..] {
                            produced.push(Message::tool_result(&skipped.id, "Not executed"));
                        }
                        return fail(events, FailureReason::ToolOrModelError(reason)).await;
                    }
                }
            }
        }
    }

    fn request(
        &self,
        history: &[Message],
        input: &Message,
        produced: &[Message],
        tool_defs: &[ToolDefinition],
    ) -> ProviderRequest {
        let ctx = &self.context;
        let mut messages = Vec::with_capacity(history.len() + produced.len() + 2);
        messages.push(Message::system(&ctx.system_prompt));
        messages.extend_from_slice(history);
        messages.push(input.clone());
        messages.extend_from_slice(produced);

        ProviderRequest {
            model: ctx.model.clone(),
            messages,
            temperature: ctx.temperature,
            max_tokens: ctx.max_tokens,
            tools: tool_defs.to_vec(),
        }
    }

    async fn execute(&self, call: &MessageToolCall) -> Result<String, String> {
        let arguments = if call.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&call.arguments)
                .map_err(|e| format!("Invalid tool arguments: {}: not valid JSON: {e}", call.name))?
        };

        debug!(tool = %call.name, "Executing tool");
        let result = self
            .context
            .tools
            .execute(&ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments,
            })
            .await
            .map_err(|e| e.to_string())?;
        if let Some(data) = &result.data {
            debug!(tool = %call.name, call_id = %result.call_id, %data, "Tool returned data");
        }
        Ok(result.output)
    }
}

async fn emit(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), Disconnected> {
    events.send(event).await.map_err(|_| Disconnected)
}

/// Relay the failure as an error frame and end the turn with it.
async fn fail(
    events: &mpsc::Sender<AgentEvent>,
    reason: FailureReason,
) -> Result<TurnOutcome, Disconnected> {
    let message = TurnError::from(reason.clone()).to_string();
    emit(events, AgentEvent::error(message)).await?;
    Ok(TurnOutcome::Failed(reason))
}
