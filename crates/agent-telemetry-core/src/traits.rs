//! Collaborator traits at the telemetry core's boundary.
//!
//! Everything the core does not own - shipping events to a backend,
//! fingerprinting the host, attributing calls to agents, detecting agent
//! frameworks - is reached through one of these traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;
use crate::host_env::HostEnv;
use crate::session::{EndState, TokenCost};

/// Session identifier.
pub type SessionId = Uuid;

/// Agent identifier.
pub type AgentId = Uuid;

/// Snapshot of a session handed to the transport at finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: SessionId,
    /// When the session started.
    pub init_timestamp: DateTime<Utc>,
    /// When the session ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<DateTime<Utc>>,
    /// Terminal state of the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_state: Option<EndState>,
    /// Free-text reason accompanying the end state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_state_reason: Option<String>,
    /// Session tags, in order of first appearance.
    pub tags: Vec<String>,
    /// Screen-recording URL for the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    /// Number of events recorded against the session.
    pub event_count: usize,
}

/// Event sink for a telemetry backend.
///
/// Both operations are best-effort from the core's point of view: they must
/// not block for long and must not fail the caller. Implementations that
/// batch over the network are expected to enqueue internally; the methods
/// are synchronous so finalization stays callable from shutdown paths where
/// no executor is available.
pub trait Transport: Send + Sync {
    /// Forward a recorded event.
    fn send(&self, session_id: SessionId, event: &Event);

    /// Flush and finalize a session, reporting its token cost.
    fn finalize(&self, summary: &SessionSummary) -> TokenCost;
}

/// Host-environment fingerprinting, consulted once per session creation.
pub trait HostEnvResolver: Send + Sync {
    /// Describe the host. `opted_out` requests a minimal descriptor.
    fn fingerprint(&self, opted_out: bool) -> HostEnv;
}

/// Ambient agent attribution, consulted once per recorded event.
pub trait AgentResolver: Send + Sync {
    /// The agent the current call should be attributed to, if any.
    fn current_agent(&self) -> Option<AgentId>;
}

/// Resolver that never attributes an agent.
#[derive(Debug, Default, Clone)]
pub struct NoAgents;

impl AgentResolver for NoAgents {
    fn current_agent(&self) -> Option<AgentId> {
        None
    }
}

/// Defaults contributed by a recognized agent framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkProfile {
    /// Framework name, also used as a session tag.
    pub name: String,
    /// Whether LLM calls should be instrumented when this framework runs.
    pub instrument_llm_calls: bool,
    /// Whether a session should be started automatically.
    pub auto_start_session: bool,
}

/// Detection of known agent frameworks, consulted once at client
/// construction to adjust default behavior.
pub trait FrameworkDetector: Send + Sync {
    /// All frameworks this detector knows about.
    fn known_frameworks(&self) -> Vec<FrameworkProfile>;

    /// Whether the named framework is active in this process.
    fn is_loaded(&self, name: &str) -> bool;
}

/// Detector that never reports a framework.
#[derive(Debug, Default, Clone)]
pub struct NoFrameworks;

impl FrameworkDetector for NoFrameworks {
    fn known_frameworks(&self) -> Vec<FrameworkProfile> {
        Vec::new()
    }

    fn is_loaded(&self, _name: &str) -> bool {
        false
    }
}
