//! In-process transport implementations.
//!
//! Useful for development and tests. A real backend transport implements
//! [`Transport`](crate::traits::Transport) with its own queueing; these keep
//! everything in memory or drop it.

use std::sync::RwLock;

use crate::event::Event;
use crate::session::TokenCost;
use crate::traits::{SessionId, SessionSummary, Transport};

/// Transport that drops every event and reports an unknown cost.
#[derive(Debug, Default, Clone)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _session_id: SessionId, _event: &Event) {}

    fn finalize(&self, _summary: &SessionSummary) -> TokenCost {
        TokenCost::Unknown
    }
}

/// Transport that captures everything in memory.
///
/// Data is lost on drop; intended for tests and local inspection.
pub struct RecordingTransport {
    sent: RwLock<Vec<(SessionId, Event)>>,
    finalized: RwLock<Vec<SessionSummary>>,
    cost: TokenCost,
}

impl RecordingTransport {
    /// Create a recording transport reporting an unknown cost.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(TokenCost::Unknown)
    }

    /// Create a recording transport reporting a fixed cost at finalization.
    #[must_use]
    pub fn with_cost(cost: TokenCost) -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            finalized: RwLock::new(Vec::new()),
            cost,
        }
    }

    /// Events forwarded so far, in arrival order.
    #[must_use]
    pub fn sent(&self) -> Vec<(SessionId, Event)> {
        self.sent.read().map(|v| v.clone()).unwrap_or_default()
    }

    /// Summaries of finalized sessions, in arrival order.
    #[must_use]
    pub fn finalized(&self) -> Vec<SessionSummary> {
        self.finalized.read().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, session_id: SessionId, event: &Event) {
        if let Ok(mut sent) = self.sent.write() {
            sent.push((session_id, event.clone()));
        }
    }

    fn finalize(&self, summary: &SessionSummary) -> TokenCost {
        if let Ok(mut finalized) = self.finalized.write() {
            finalized.push(summary.clone());
        }
        self.cost
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::event::ActionEvent;

    #[test]
    fn test_recording_transport_captures() {
        let transport = RecordingTransport::with_cost(TokenCost::Usd { amount: 0.25 });
        let session_id = Uuid::new_v4();

        transport.send(session_id, &ActionEvent::new("step").into());
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].0, session_id);

        let summary = SessionSummary {
            session_id,
            init_timestamp: chrono::Utc::now(),
            end_timestamp: None,
            end_state: None,
            end_state_reason: None,
            tags: Vec::new(),
            video: None,
            event_count: 1,
        };
        let cost = transport.finalize(&summary);
        assert_eq!(cost, TokenCost::Usd { amount: 0.25 });
        assert_eq!(transport.finalized().len(), 1);
    }
}
