//! Turn scheduling: admission, execution and autonomous heartbeat turns.
//!
//! A turn runs the reasoning loop on its own task and relays the loop's
//! events to the connection in order. The caller keeps ownership of its
//! inbound stream, so pings and overlapping messages are handled while a
//! turn is in flight.

use crate::react::{AbortReason, FailureReason, ReasoningLoop, TurnOutcome};
use crate::relay::{EventRelay, EventSink};
use crate::session::{SessionRegistry, TurnHandle, TurnInput};
use crate::stream_event::AgentEvent;
use npcrelay_core::error::TurnError;
use npcrelay_core::message::{Message, SessionId};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Capacity of the loop → relay channel.
const EVENT_BUFFER: usize = 32;

/// Summary of one finished turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    pub events_relayed: usize,
    pub steps: u32,
}

pub struct TurnScheduler {
    registry: Arc<SessionRegistry>,
    autonomous_prompt: String,
}

impl TurnScheduler {
    pub fn new(registry: Arc<SessionRegistry>, autonomous_prompt: impl Into<String>) -> Self {
        Self {
            registry,
            autonomous_prompt: autonomous_prompt.into(),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Claim the session's turn slot without running anything yet.
    pub fn admit(&self, session_id: &SessionId, input: TurnInput) -> Result<TurnHandle, TurnError> {
        self.registry.begin_turn(session_id, input)
    }

    /// Admit and run a turn to completion.
    pub async fn run_turn(
        &self,
        session_id: &SessionId,
        input: TurnInput,
        sink: Arc<dyn EventSink>,
    ) -> Result<TurnReport, TurnError> {
        let handle = self.admit(session_id, input)?;
        Ok(self.run_admitted(handle, sink).await)
    }

    /// Run an already admitted turn. The slot is released when this returns
    /// or is cancelled.
    pub async fn run_admitted(&self, handle: TurnHandle, sink: Arc<dyn EventSink>) -> TurnReport {
        let session = handle.session().clone();
        let session_id = session.id().clone();
        let text = match handle.input() {
            TurnInput::User(text) => text.clone(),
            TurnInput::Autonomous => self.autonomous_prompt.clone(),
        };

        let input = Message::user(text);
        let history = session.history().unwrap_or_default();
        if let Err(e) = session.append(input.clone()) {
            debug!(session_id = %session_id, error = %e, "Session closed before turn started");
            return TurnReport {
                outcome: TurnOutcome::Aborted(AbortReason::ClientDisconnected),
                events_relayed: 0,
                steps: 0,
            };
        }

        let (tx, mut rx) = mpsc::channel::<AgentEvent>(EVENT_BUFFER);
        let reasoning = ReasoningLoop::new(session.context().clone());
        let steps_taken = reasoning.steps_taken();
        let loop_task = tokio::spawn(async move { reasoning.run(history, input, tx).await });

        let mut relay = EventRelay::new(sink);
        while let Some(event) = rx.recv().await {
            if let Err(e) = relay.emit(&event).await {
                warn!(session_id = %session_id, error = %e, "Transport failed mid-turn; tearing down session");
                drop(rx);
                loop_task.abort();
                self.registry.close(&session_id);
                let report = TurnReport {
                    outcome: TurnOutcome::Aborted(AbortReason::ClientDisconnected),
                    events_relayed: relay.relayed(),
                    steps: steps_taken.load(Ordering::Relaxed),
                };
                info!(session_id = %session_id, outcome = %report.outcome, "Turn finished");
                return report;
            }
        }

        let (outcome, steps) = match loop_task.await {
            Ok(report) => {
                for message in report.produced {
                    if session.append(message).is_err() {
                        break;
                    }
                }
                (report.outcome, report.steps)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Reasoning task ended abnormally");
                let reason = "The agent stopped unexpectedly".to_string();
                if relay.emit(&AgentEvent::error(reason.clone())).await.is_err() {
                    self.registry.close(&session_id);
                }
                (
                    TurnOutcome::Failed(FailureReason::ToolOrModelError(reason)),
                    steps_taken.load(Ordering::Relaxed),
                )
            }
        };

        let report = TurnReport {
            outcome,
            events_relayed: relay.relayed(),
            steps,
        };
        info!(
            session_id = %session_id,
            outcome = %report.outcome,
            events = report.events_relayed,
            steps = report.steps,
            "Turn finished"
        );
        report
    }

    /// Start heartbeat turns on a session every `period`, first one now.
    ///
    /// A tick that finds the slot busy is skipped, never queued. The task
    /// ends when the session goes away; abort the handle to stop earlier.
    /// Aborting does not cancel a turn that already started.
    pub fn spawn_autonomous(
        self: &Arc<Self>,
        session_id: SessionId,
        sink: Arc<dyn EventSink>,
        period: Duration,
    ) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match scheduler.admit(&session_id, TurnInput::Autonomous) {
                    Ok(handle) => {
                        debug!(session_id = %session_id, "Autonomous turn admitted");
                        let runner = scheduler.clone();
                        let sink = sink.clone();
                        tokio::spawn(async move {
                            runner.run_admitted(handle, sink).await;
                        });
                    }
                    Err(TurnError::TurnAlreadyInFlight(_)) => {
                        debug!(session_id = %session_id, "Turn in flight; autonomous tick skipped");
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Autonomous mode stopping");
                        break;
                    }
                }
            }
        })
    }
}
