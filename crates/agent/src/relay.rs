//! Ordered delivery of turn events to a client transport.

use crate::stream_event::{AgentEvent, ServerFrame};
use async_trait::async_trait;
use npcrelay_core::error::TransportError;
use std::sync::Arc;
use tracing::trace;

/// Where frames for one connection go.
///
/// Implementations must deliver frames in the order `send` is called and
/// must fail, rather than block forever, once the client is gone.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, frame: ServerFrame) -> Result<(), TransportError>;
}

/// Serializes a turn's events onto an [`EventSink`], counting what it sent.
pub struct EventRelay {
    sink: Arc<dyn EventSink>,
    relayed: usize,
}

impl EventRelay {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink, relayed: 0 }
    }

    pub async fn emit(&mut self, event: &AgentEvent) -> Result<(), TransportError> {
        self.send(ServerFrame::from(event)).await
    }

    pub async fn send(&mut self, frame: ServerFrame) -> Result<(), TransportError> {
        trace!(frame = frame.frame_type(), "Relaying frame");
        self.sink.send(frame).await?;
        self.relayed += 1;
        Ok(())
    }

    /// Frames successfully handed to the sink so far.
    pub fn relayed(&self) -> usize {
        self.relayed
    }
}
