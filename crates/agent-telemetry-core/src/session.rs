//! Session: event buffer, tag set and end state for one logical run.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::event::Event;
use crate::host_env::HostEnv;
use crate::traits::{AgentId, SessionId, SessionSummary, Transport};

/// Terminal classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndState {
    /// The run completed as intended.
    Success,
    /// The run failed.
    Fail,
    /// The run ended without a clear outcome.
    Indeterminate,
}

impl FromStr for EndState {
    type Err = InvalidEndState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Self::Success),
            "Fail" => Ok(Self::Fail),
            "Indeterminate" => Ok(Self::Indeterminate),
            other => Err(InvalidEndState(other.to_string())),
        }
    }
}

impl std::fmt::Display for EndState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Fail => write!(f, "Fail"),
            Self::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// An end-state string outside the fixed set.
#[derive(Debug, Clone, Error)]
#[error("invalid end state {0:?}, expected Success, Fail or Indeterminate")]
pub struct InvalidEndState(pub String);

/// Token cost reported by the transport at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cost", rename_all = "snake_case")]
pub enum TokenCost {
    /// Cost in US dollars.
    Usd { amount: f64 },
    /// The transport could not determine a cost.
    Unknown,
}

impl TokenCost {
    /// Cost in dollars, treating unknown as zero.
    #[must_use]
    pub fn or_zero(&self) -> f64 {
        match self {
            Self::Usd { amount } => *amount,
            Self::Unknown => 0.0,
        }
    }
}

/// Session error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is already closed")]
    Closed,
}

/// Mutable session state, guarded by the session lock.
struct SessionInner {
    tags: Vec<String>,
    events: Vec<Event>,
    agents: HashMap<AgentId, String>,
    end_state: Option<EndState>,
    end_state_reason: Option<String>,
    end_timestamp: Option<DateTime<Utc>>,
    video: Option<String>,
}

/// A bounded unit of agent activity.
///
/// Buffers events in recording order, owns tag and end-state mutation, and
/// forwards to the transport. All state transitions happen under one lock so
/// a shutdown hook can never race an in-flight finalization.
pub struct Session {
    id: SessionId,
    init_timestamp: DateTime<Utc>,
    host_env: HostEnv,
    transport: Arc<dyn Transport>,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Create a new session.
    #[must_use]
    pub fn new(
        id: SessionId,
        tags: Vec<String>,
        host_env: HostEnv,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id,
            init_timestamp: Utc::now(),
            host_env,
            transport,
            inner: Mutex::new(SessionInner {
                tags,
                events: Vec::new(),
                agents: HashMap::new(),
                end_state: None,
                end_state_reason: None,
                end_timestamp: None,
                video: None,
            }),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// When the session started.
    #[must_use]
    pub fn init_timestamp(&self) -> DateTime<Utc> {
        self.init_timestamp
    }

    /// Host descriptor captured at creation.
    #[must_use]
    pub fn host_env(&self) -> &HostEnv {
        &self.host_env
    }

    // Shutdown hooks may run after a panicking thread poisoned the lock;
    // the inner state is still coherent (every mutation is a single write).
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the session has not yet reached a terminal state.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().end_state.is_none()
    }

    /// Terminal state, once set.
    #[must_use]
    pub fn end_state(&self) -> Option<EndState> {
        self.lock().end_state
    }

    /// Reason recorded with the terminal state.
    #[must_use]
    pub fn end_state_reason(&self) -> Option<String> {
        self.lock().end_state_reason.clone()
    }

    /// When the session ended, once set.
    #[must_use]
    pub fn end_timestamp(&self) -> Option<DateTime<Utc>> {
        self.lock().end_timestamp
    }

    /// Current tag set, in order of first appearance.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.lock().tags.clone()
    }

    /// Registered agents, by id.
    #[must_use]
    pub fn agents(&self) -> HashMap<AgentId, String> {
        self.lock().agents.clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    /// Record an event against this session.
    ///
    /// The event is appended to the buffer and forwarded to the transport.
    /// Transport failures are the transport's problem; they never fail this
    /// call.
    ///
    /// # Errors
    /// Returns `SessionError::Closed` if the session already ended.
    pub fn record(&self, event: Event) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.end_state.is_some() {
            return Err(SessionError::Closed);
        }
        self.transport.send(self.id, &event);
        inner.events.push(event);
        Ok(())
    }

    /// Append tags, skipping duplicates and preserving first appearance.
    pub fn add_tags(&self, tags: &[String]) {
        let mut inner = self.lock();
        for tag in tags {
            if !inner.tags.contains(tag) {
                inner.tags.push(tag.clone());
            }
        }
    }

    /// Replace the tag set.
    pub fn set_tags(&self, tags: &[String]) {
        self.lock().tags = tags.to_vec();
    }

    /// Register an agent. Last write wins on id collision.
    pub fn create_agent(&self, name: &str, agent_id: AgentId) {
        self.lock().agents.insert(agent_id, name.to_string());
    }

    /// Attach a screen-recording URL.
    pub fn set_video(&self, url: &str) {
        self.lock().video = Some(url.to_string());
    }

    /// End the session. First write wins.
    ///
    /// Sets the end state and timestamp, finalizes with the transport and
    /// returns the reported token cost. Returns `None` when the session was
    /// already closed; nothing is mutated in that case.
    pub fn end(&self, end_state: EndState, reason: Option<&str>) -> Option<TokenCost> {
        let summary = {
            let mut inner = self.lock();
            if inner.end_state.is_some() {
                debug!(session_id = %self.id, "session already ended, ignoring");
                return None;
            }
            inner.end_state = Some(end_state);
            inner.end_state_reason = reason.map(ToString::to_string);
            if inner.end_timestamp.is_none() {
                inner.end_timestamp = Some(Utc::now());
            }
            SessionSummary {
                session_id: self.id,
                init_timestamp: self.init_timestamp,
                end_timestamp: inner.end_timestamp,
                end_state: inner.end_state,
                end_state_reason: inner.end_state_reason.clone(),
                tags: inner.tags.clone(),
                video: inner.video.clone(),
                event_count: inner.events.len(),
            }
        };
        debug!(session_id = %self.id, end_state = %end_state, "session ended");
        Some(self.transport.finalize(&summary))
    }

    /// Snapshot of the session's current state.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        let inner = self.lock();
        SessionSummary {
            session_id: self.id,
            init_timestamp: self.init_timestamp,
            end_timestamp: inner.end_timestamp,
            end_state: inner.end_state,
            end_state_reason: inner.end_state_reason.clone(),
            tags: inner.tags.clone(),
            video: inner.video.clone(),
            event_count: inner.events.len(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("init_timestamp", &self.init_timestamp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::event::ActionEvent;
    use crate::transport::RecordingTransport;

    fn open_session(transport: Arc<RecordingTransport>) -> Session {
        Session::new(
            Uuid::new_v4(),
            vec!["test".to_string()],
            HostEnv::minimal(),
            transport,
        )
    }

    #[test]
    fn test_record_appends_and_forwards() {
        let transport = Arc::new(RecordingTransport::new());
        let session = open_session(Arc::clone(&transport));

        session.record(ActionEvent::new("step").into()).unwrap();
        session.record(ActionEvent::new("step").into()).unwrap();

        assert_eq!(session.event_count(), 2);
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_record_after_end_fails() {
        let transport = Arc::new(RecordingTransport::new());
        let session = open_session(Arc::clone(&transport));

        session.end(EndState::Success, None);
        let err = session.record(ActionEvent::new("late").into());
        assert!(matches!(err, Err(SessionError::Closed)));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_end_is_first_write_wins() {
        let transport = Arc::new(RecordingTransport::new());
        let session = open_session(Arc::clone(&transport));

        let cost = session.end(EndState::Fail, Some("boom"));
        assert!(cost.is_some());
        let first_end = session.end_timestamp();

        assert!(session.end(EndState::Success, Some("never")).is_none());
        assert_eq!(session.end_state(), Some(EndState::Fail));
        assert_eq!(session.end_state_reason().as_deref(), Some("boom"));
        assert_eq!(session.end_timestamp(), first_end);
        assert_eq!(transport.finalized().len(), 1);
    }

    #[test]
    fn test_add_tags_dedups_preserving_order() {
        let transport = Arc::new(RecordingTransport::new());
        let session = Session::new(Uuid::new_v4(), Vec::new(), HostEnv::minimal(), transport);

        session.add_tags(&["a".to_string()]);
        session.add_tags(&["a".to_string(), "b".to_string()]);
        assert_eq!(session.tags(), vec!["a".to_string(), "b".to_string()]);

        session.set_tags(&["c".to_string()]);
        assert_eq!(session.tags(), vec!["c".to_string()]);
    }

    #[test]
    fn test_create_agent_last_write_wins() {
        let transport = Arc::new(RecordingTransport::new());
        let session = open_session(transport);
        let agent = Uuid::new_v4();

        session.create_agent("first", agent);
        session.create_agent("second", agent);
        assert_eq!(session.agents().get(&agent).map(String::as_str), Some("second"));
    }

    #[test]
    fn test_end_state_parsing() {
        assert_eq!("Success".parse::<EndState>().unwrap(), EndState::Success);
        assert!("Maybe".parse::<EndState>().is_err());
    }

    #[test]
    fn test_token_cost_or_zero() {
        assert!((TokenCost::Unknown.or_zero() - 0.0).abs() < f64::EPSILON);
        assert!((TokenCost::Usd { amount: 1.5 }.or_zero() - 1.5).abs() < f64::EPSILON);
    }
}
