//! Conversation sessions and single-flight turn admission.
//!
//! One [`Session`] exists per client connection. It owns the ordered
//! history and a busy flag; [`SessionRegistry::begin_turn`] claims that flag
//! with a compare-and-swap and hands back a [`TurnHandle`] whose drop
//! releases it, whatever way the turn ends.

use crate::context::AgentContext;
use npcrelay_core::error::TurnError;
use npcrelay_core::message::{Conversation, Message, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// What starts a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// A message typed by the client.
    User(String),
    /// A heartbeat turn synthesized by autonomous mode.
    Autonomous,
}

pub struct Session {
    id: SessionId,
    history: Mutex<Conversation>,
    turn_in_flight: AtomicBool,
    closed: AtomicBool,
    context: Arc<AgentContext>,
}

impl Session {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The context snapshot taken when the session opened.
    pub fn context(&self) -> &Arc<AgentContext> {
        &self.context
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.turn_in_flight.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TurnError> {
        if self.is_closed() {
            Err(TurnError::SessionNotFound(self.id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn append(&self, message: Message) -> Result<(), TurnError> {
        self.ensure_open()?;
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<Message>, TurnError> {
        self.ensure_open()?;
        Ok(self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .clone())
    }
}

/// Exclusive right to run one turn on a session.
///
/// Dropping the handle clears the session's busy flag, so the flag is
/// released on success, failure, panic unwinding and task cancellation alike.
pub struct TurnHandle {
    session: Arc<Session>,
    input: TurnInput,
}

impl TurnHandle {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn input(&self) -> &TurnInput {
        &self.input
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        self.session.turn_in_flight.store(false, Ordering::Release);
        debug!(session_id = %self.session.id, "Turn released");
    }
}

/// Release a turn explicitly. Equivalent to dropping the handle.
pub fn end_turn(handle: TurnHandle) {
    drop(handle);
}

/// All live sessions, keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session with a fresh id and empty history.
    pub fn create_session(&self, context: Arc<AgentContext>) -> Arc<Session> {
        let id = SessionId::new();
        let session = Arc::new(Session {
            id: id.clone(),
            history: Mutex::new(Conversation::new(id.clone())),
            turn_in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            context,
        });
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), session.clone());
        info!(session_id = %id, "Session opened");
        session
    }

    pub fn get(&self, id: &SessionId) -> Result<Arc<Session>, TurnError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| TurnError::SessionNotFound(id.to_string()))
    }

    pub fn append_history(&self, id: &SessionId, message: Message) -> Result<(), TurnError> {
        self.get(id)?.append(message)
    }

    pub fn history(&self, id: &SessionId) -> Result<Vec<Message>, TurnError> {
        self.get(id)?.history()
    }

    pub fn is_turn_in_flight(&self, id: &SessionId) -> Result<bool, TurnError> {
        Ok(self.get(id)?.is_turn_in_flight())
    }

    /// Claim the session's single turn slot.
    pub fn begin_turn(&self, id: &SessionId, input: TurnInput) -> Result<TurnHandle, TurnError> {
        let session = self.get(id)?;
        session.ensure_open()?;
        session
            .turn_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TurnError::TurnAlreadyInFlight(id.to_string()))?;
        debug!(session_id = %id, ?input, "Turn admitted");
        Ok(TurnHandle { session, input })
    }

    /// Tear the session down. Later operations on it fail with `SessionNotFound`.
    pub fn close(&self, id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        match removed {
            Some(session) => {
                session.closed.store(true, Ordering::Release);
                info!(session_id = %id, "Session closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_context;

    #[test]
    fn sessions_get_distinct_ids() {
        let registry = SessionRegistry::new();
        let a = registry.create_session(test_context(vec![]));
        let b = registry.create_session(test_context(vec![]));
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
        assert!(registry.history(a.id()).unwrap().is_empty());
    }

    #[test]
    fn history_is_append_only() {
        let registry = SessionRegistry::new();
        let s = registry.create_session(test_context(vec![]));
        registry.append_history(s.id(), Message::user("one")).unwrap();
        registry.append_history(s.id(), Message::assistant("two")).unwrap();

        let history = registry.history(s.id()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "one");
        assert_eq!(history[1].content, "two");
    }

    #[test]
    fn second_admission_is_rejected() {
        let registry = SessionRegistry::new();
        let s = registry.create_session(test_context(vec![]));

        let handle = registry.begin_turn(s.id(), TurnInput::User("hi".into())).unwrap();
        assert!(registry.is_turn_in_flight(s.id()).unwrap());
        assert!(matches!(
            registry.begin_turn(s.id(), TurnInput::Autonomous),
            Err(TurnError::TurnAlreadyInFlight(_))
        ));

        end_turn(handle);
        assert!(!registry.is_turn_in_flight(s.id()).unwrap());
        assert!(registry.begin_turn(s.id(), TurnInput::Autonomous).is_ok());
    }

    #[test]
    fn concurrent_admission_admits_exactly_one() {
        let registry = Arc::new(SessionRegistry::new());
        let s = registry.create_session(test_context(vec![]));
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let threads: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                let id = s.id().clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.begin_turn(&id, TurnInput::User(format!("msg {i}")))
                })
            })
            .collect();

        let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 1);
        assert!(results.iter().all(|r| match r {
            Ok(_) => true,
            Err(e) => matches!(e, TurnError::TurnAlreadyInFlight(_)),
        }));
    }

    #[test]
    fn handle_released_on_panic() {
        let registry = Arc::new(SessionRegistry::new());
        let s = registry.create_session(test_context(vec![]));
        let id = s.id().clone();

        let r = registry.clone();
        let outcome = std::thread::spawn(move || {
            let _handle = r.begin_turn(&id, TurnInput::Autonomous).unwrap();
            panic!("turn blew up");
        })
        .join();
        assert!(outcome.is_err());
        assert!(!registry.is_turn_in_flight(s.id()).unwrap());
    }

    #[test]
    fn closed_session_is_not_found() {
        let registry = SessionRegistry::new();
        let s = registry.create_session(test_context(vec![]));
        let id = s.id().clone();

        assert!(registry.close(&id));
        assert!(!registry.close(&id));
        assert!(matches!(registry.history(&id), Err(TurnError::SessionNotFound(_))));
        assert!(matches!(
            registry.append_history(&id, Message::user("late")),
            Err(TurnError::SessionNotFound(_))
        ));
        assert!(matches!(
            registry.begin_turn(&id, TurnInput::Autonomous),
            Err(TurnError::SessionNotFound(_))
        ));
        // Holders of the Arc see the closure too.
        assert!(s.append(Message::user("late")).is_err());
    }
}
