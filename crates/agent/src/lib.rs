//! The agent side of npcrelay: sessions, turns and the reasoning loop.
//!
//! A turn flows through four pieces:
//!
//! 1. **Admit**: [`SessionRegistry::begin_turn`] claims the session's single
//!    turn slot, or rejects the request if a turn is already running
//! 2. **Reason**: [`ReasoningLoop`] alternates provider calls and tool
//!    executions until the model answers or the step limit is hit
//! 3. **Relay**: [`EventRelay`] forwards each event to the client's
//!    [`EventSink`] in the order it was produced
//! 4. **Record**: [`TurnScheduler`] appends the turn's messages to history
//!    and releases the slot
//!
//! Autonomous mode is a ticker that submits heartbeat turns through the
//! same admission path.

pub mod context;
pub mod react;
pub mod relay;
pub mod scheduler;
pub mod session;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::AgentContext;
pub use react::{AbortReason, FailureReason, LoopReport, ReasoningLoop, TurnOutcome};
pub use relay::{EventRelay, EventSink};
pub use scheduler::{TurnReport, TurnScheduler};
pub use session::{Session, SessionRegistry, TurnHandle, TurnInput, end_turn};
pub use stream_event::{AgentEvent, ServerFrame};
