//! `GET /ws`: the conversation socket.
//!
//! Client → server frames:
//! - `{"message": "..."}` starts a turn
//! - `{"message": "ping"}` is answered with `{"type":"pong"}`
//! - `{"mode": "auto" | "chat"}` toggles autonomous turns
//!
//! Server → client frames are [`ServerFrame`]s. A single writer task owns
//! the socket's write half; everything else sends through a bounded
//! channel via [`WsSink`].

use crate::SharedState;
use async_trait::async_trait;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use npcrelay_agent::{EventSink, ServerFrame, Session, TurnInput};
use npcrelay_core::error::{TransportError, TurnError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the per-connection outbound queue.
const FRAME_BUFFER: usize = 32;

pub(crate) const TURN_IN_PROGRESS: &str = "A turn is already in progress for this session";

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Frames go into the connection's outbound queue, in call order.
pub struct WsSink {
    tx: mpsc::Sender<ServerFrame>,
}

impl WsSink {
    pub fn new(tx: mpsc::Sender<ServerFrame>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for WsSink {
    async fn send(&self, frame: ServerFrame) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::new("connection writer closed"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    Auto,
    Chat,
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    mode: Option<Mode>,
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (ws_tx, ws_rx) = socket.split();
    serve_connection(ws_tx, ws_rx, state).await;
}

/// Drive one connection until the client closes or the stream fails. The
/// session is closed and the writer stopped on the way out; a turn still
/// running notices at its next send.
async fn serve_connection<W, R, E>(mut ws_tx: W, mut ws_rx: R, state: SharedState)
where
    W: Sink<WsMessage> + Unpin + Send + 'static,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(FRAME_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(WsMessage::Text(frame.to_json().into())).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection::open(state, Arc::new(WsSink::new(tx))).await;
    info!(session_id = %conn.session.id(), "WebSocket connection established");

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        if let Err(e) = conn.handle_text(text.as_str()).await {
            debug!(error = %e, "Stopping reader");
            break;
        }
    }

    conn.close();
    writer.abort();
}

/// One client's session plus its autonomous ticker.
pub(crate) struct Connection {
    state: SharedState,
    session: Arc<Session>,
    sink: Arc<dyn EventSink>,
    autonomous: Option<JoinHandle<()>>,
}

impl Connection {
    /// Open a session framed by the current context.
    pub(crate) async fn open(state: SharedState, sink: Arc<dyn EventSink>) -> Self {
        let context = state.current_context().await;
        let session = state.registry.create_session(context);
        let mut conn = Self {
            state,
            session,
            sink,
            autonomous: None,
        };
        if conn.state.config.autonomous.enabled_by_default {
            if let Err(e) = conn.start_autonomous().await {
                debug!(session_id = %conn.session.id(), error = %e, "Client gone before autonomous mode started");
            }
        }
        conn
    }

    /// Handle one inbound text frame. An error means the client is gone.
    pub(crate) async fn handle_text(&mut self, text: &str) -> Result<(), TransportError> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                return self
                    .sink
                    .send(ServerFrame::error(format!("Invalid message: {e}")))
                    .await;
            }
        };

        match frame.mode {
            Some(Mode::Auto) => return self.start_autonomous().await,
            Some(Mode::Chat) => self.stop_autonomous().await?,
            None => {}
        }

        let message = frame.message.unwrap_or_default();
        let message = message.trim();
        if message.is_empty() {
            if frame.mode.is_some() {
                return Ok(());
            }
            return self
                .sink
                .send(ServerFrame::error("Message must not be empty"))
                .await;
        }
        if message == "ping" {
            return self.sink.send(ServerFrame::Pong).await;
        }

        self.submit(message.to_string()).await
    }

    async fn submit(&self, message: String) -> Result<(), TransportError> {
        let scheduler = self.state.scheduler.clone();
        match scheduler.admit(self.session.id(), TurnInput::User(message)) {
            Ok(handle) => {
                let sink = self.sink.clone();
                tokio::spawn(async move {
                    scheduler.run_admitted(handle, sink).await;
                });
                Ok(())
            }
            Err(TurnError::TurnAlreadyInFlight(_)) => {
                debug!(session_id = %self.session.id(), "Rejected overlapping message");
                self.sink.send(ServerFrame::error(TURN_IN_PROGRESS)).await
            }
            Err(e) => {
                warn!(session_id = %self.session.id(), error = %e, "Session unavailable");
                Err(TransportError::new(e.to_string()))
            }
        }
    }

    async fn start_autonomous(&mut self) -> Result<(), TransportError> {
        if self.autonomous.is_some() {
            return Ok(());
        }
        self.sink
            .send(ServerFrame::status("Starting autonomous mode..."))
            .await?;
        let period = Duration::from_secs(self.state.config.autonomous.interval_secs);
        info!(session_id = %self.session.id(), period_secs = period.as_secs(), "Autonomous mode on");
        self.autonomous = Some(self.state.scheduler.spawn_autonomous(
            self.session.id().clone(),
            self.sink.clone(),
            period,
        ));
        Ok(())
    }

    async fn stop_autonomous(&mut self) -> Result<(), TransportError> {
        let Some(ticker) = self.autonomous.take() else {
            return Ok(());
        };
        ticker.abort();
        info!(session_id = %self.session.id(), "Autonomous mode off");
        self.sink
            .send(ServerFrame::status("Stopping autonomous mode..."))
            .await
    }

    pub(crate) fn is_autonomous(&self) -> bool {
        self.autonomous.is_some()
    }

    /// Stop the ticker and tear the session down.
    pub(crate) fn close(mut self) {
        if let Some(ticker) = self.autonomous.take() {
            ticker.abort();
        }
        self.state.registry.close(self.session.id());
        info!(session_id = %self.session.id(), "WebSocket connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EchoProvider, StallingProvider, fixture, state_with};
    use futures::channel::mpsc as socket;
    use npcrelay_config::AppConfig;
    use npcrelay_tools::SimulatedWallet;

    type Inbound = Result<WsMessage, axum::Error>;

    fn text(raw: &str) -> Inbound {
        Ok(WsMessage::Text(raw.to_string().into()))
    }

    fn sink() -> (Arc<dyn EventSink>, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        (Arc::new(WsSink::new(tx)), rx)
    }

    async fn next(rx: &mut mpsc::Receiver<ServerFrame>) -> ServerFrame {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("sink closed")
    }

    #[tokio::test]
    async fn message_runs_a_turn() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        conn.handle_text(r#"{"message":"What is 2+2?"}"#).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            ServerFrame::Agent {
                content: "4".into()
            }
        );
        assert_eq!(fx.provider.calls(), 1);
    }

    #[tokio::test]
    async fn pings_are_answered_without_turns() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        for raw in [
            r#"{"message":"ping"}"#,
            r#"{"message":" ping "}"#,
            r#"{"message":"ping"}"#,
        ] {
            conn.handle_text(raw).await.unwrap();
        }
        for _ in 0..3 {
            assert_eq!(next(&mut rx).await, ServerFrame::Pong);
        }
        assert_eq!(fx.provider.calls(), 0);
        assert!(conn.session.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ping_is_case_sensitive() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        conn.handle_text(r#"{"message":"PING"}"#).await.unwrap();
        assert_eq!(next(&mut rx).await.frame_type(), "agent");
        assert_eq!(fx.provider.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_json_keeps_connection_open() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        conn.handle_text("not json").await.unwrap();
        match next(&mut rx).await {
            ServerFrame::Error { content } => assert!(content.starts_with("Invalid message")),
            other => panic!("expected error frame, got {other:?}"),
        }

        conn.handle_text(r#"{"message":"ping"}"#).await.unwrap();
        assert_eq!(next(&mut rx).await, ServerFrame::Pong);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        conn.handle_text(r#"{"message":"   "}"#).await.unwrap();
        assert_eq!(next(&mut rx).await.frame_type(), "error");
        assert_eq!(fx.provider.calls(), 0);
    }

    #[tokio::test]
    async fn overlapping_message_is_rejected() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        // Hold the slot as if a turn were running.
        let held = fx
            .state
            .scheduler
            .admit(conn.session.id(), TurnInput::User("first".into()))
            .unwrap();
        conn.handle_text(r#"{"message":"second"}"#).await.unwrap();
        assert_eq!(next(&mut rx).await, ServerFrame::error(TURN_IN_PROGRESS));
        drop(held);

        conn.handle_text(r#"{"message":"third"}"#).await.unwrap();
        assert_eq!(next(&mut rx).await.frame_type(), "agent");
    }

    #[tokio::test]
    async fn mode_toggles_autonomous() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        conn.handle_text(r#"{"mode":"auto"}"#).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            ServerFrame::status("Starting autonomous mode...")
        );
        assert!(conn.is_autonomous());
        // The first heartbeat turn runs right away.
        assert_eq!(next(&mut rx).await.frame_type(), "agent");

        conn.handle_text(r#"{"mode":"chat"}"#).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            ServerFrame::status("Stopping autonomous mode...")
        );
        assert!(!conn.is_autonomous());
    }

    #[tokio::test]
    async fn chat_mode_with_message_runs_turn() {
        let fx = fixture();
        let (sink, mut rx) = sink();
        let mut conn = Connection::open(fx.state.clone(), sink).await;

        conn.handle_text(r#"{"mode":"chat","message":"hello"}"#).await.unwrap();
        assert_eq!(next(&mut rx).await.frame_type(), "agent");
    }

    #[tokio::test]
    async fn close_removes_session() {
        let fx = fixture();
        let (sink, _rx) = sink();
        let conn = Connection::open(fx.state.clone(), sink).await;
        let id = conn.session.id().clone();
        assert_eq!(fx.state.registry.len(), 1);

        conn.close();
        assert!(fx.state.registry.get(&id).is_err());
        assert!(fx.state.registry.is_empty());
    }

    #[tokio::test]
    async fn socket_answers_ping_and_closes_session_on_close_frame() {
        let fx = fixture();
        let (out_tx, mut out_rx) = socket::channel::<WsMessage>(8);
        let (in_tx, in_rx) = socket::unbounded::<Inbound>();
        let task = tokio::spawn(serve_connection(out_tx, in_rx, fx.state.clone()));

        in_tx.unbounded_send(text(r#"{"message":"ping"}"#)).unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(5), out_rx.next())
            .await
            .expect("timed out waiting for pong")
            .expect("writer closed");
        match reply {
            WsMessage::Text(t) => assert_eq!(t.as_str(), r#"{"type":"pong"}"#),
            other => panic!("expected a text frame, got {other:?}"),
        }
        assert_eq!(fx.state.registry.len(), 1);

        in_tx.unbounded_send(Ok(WsMessage::Close(None))).unwrap();
        task.await.unwrap();
        assert!(fx.state.registry.is_empty());
        assert_eq!(fx.provider.calls(), 0);
    }

    #[tokio::test]
    async fn socket_disconnect_mid_turn_tears_down_session() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(StallingProvider::default());
        let state = state_with(
            AppConfig::default(),
            provider.clone(),
            Arc::new(SimulatedWallet::new("base-sepolia")),
            dir.path(),
        );
        let (out_tx, out_rx) = socket::channel::<WsMessage>(8);
        let (in_tx, in_rx) = socket::unbounded::<Inbound>();
        let task = tokio::spawn(serve_connection(out_tx, in_rx, state.clone()));

        in_tx.unbounded_send(text(r#"{"message":"hello"}"#)).unwrap();
        provider.wait_started().await;
        assert_eq!(state.registry.len(), 1);

        // The client vanishes while the provider is still working.
        drop(in_tx);
        task.await.unwrap();
        assert!(state.registry.is_empty());

        provider.release();
        let written: Vec<WsMessage> = tokio::time::timeout(Duration::from_secs(5), out_rx.collect::<Vec<_>>())
            .await
            .expect("writer never stopped");
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn autonomous_default_with_dead_client_stays_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.autonomous.enabled_by_default = true;
        let state = state_with(
            config,
            Arc::new(EchoProvider::new("4")),
            Arc::new(SimulatedWallet::new("base-sepolia")),
            dir.path(),
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let conn = Connection::open(state.clone(), Arc::new(WsSink::new(tx))).await;
        assert!(!conn.is_autonomous());
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn autonomous_default_starts_ticker() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.autonomous.enabled_by_default = true;
        let state = state_with(
            config,
            Arc::new(EchoProvider::new("4")),
            Arc::new(SimulatedWallet::new("base-sepolia")),
            dir.path(),
        );
        let (sink, mut rx) = sink();

        let conn = Connection::open(state, sink).await;
        assert!(conn.is_autonomous());
        assert_eq!(
            next(&mut rx).await,
            ServerFrame::status("Starting autonomous mode...")
        );
        conn.close();
    }

    #[tokio::test]
    async fn dropped_writer_fails_sends() {
        let (tx, rx) = mpsc::channel(1);
        let sink = WsSink::new(tx);
        drop(rx);
        assert!(sink.send(ServerFrame::Pong).await.is_err());
    }
}
