//! Structured event records for instrumented agent activity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::traits::AgentId;

/// A timed record of a single instrumented call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Name of the recorded action.
    pub action_type: String,
    /// Resolved call arguments, by parameter name.
    #[serde(default)]
    pub params: HashMap<String, Value>,
    /// Return value of the call. Plural returns surface as a JSON array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<Value>,
    /// Screenshot URL lifted from the return value, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Agent the call was attributed to, when one could be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// When the call started.
    pub init_timestamp: DateTime<Utc>,
    /// When the call returned. Unset while the call is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<DateTime<Utc>>,
}

impl ActionEvent {
    /// Create a new action event stamped with the current time.
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type: action_type.into(),
            params: HashMap::new(),
            returns: None,
            screenshot: None,
            agent_id: None,
            init_timestamp: Utc::now(),
            end_timestamp: None,
        }
    }

    /// Attach resolved call parameters.
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Attribute the event to an agent.
    #[must_use]
    pub fn with_agent(mut self, agent_id: Option<AgentId>) -> Self {
        self.agent_id = agent_id;
        self
    }

    /// Complete the event with the call's return value.
    ///
    /// Copies a `screenshot` string field out of object returns and stamps
    /// the end timestamp.
    pub fn complete(&mut self, returns: Option<Value>) {
        if let Some(Value::Object(map)) = &returns {
            if let Some(Value::String(url)) = map.get("screenshot") {
                self.screenshot = Some(url.clone());
            }
        }
        self.returns = returns;
        self.end_timestamp = Some(Utc::now());
    }
}

/// A record of a failure raised by an instrumented call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// The in-flight action that triggered the error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_event: Option<ActionEvent>,
    /// Error classification.
    pub error_type: String,
    /// Error message or detail text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Captured backtrace or log text, where available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    /// When the error was observed.
    pub timestamp: DateTime<Utc>,
}

impl ErrorEvent {
    /// Create an error event referencing the action that was in flight.
    #[must_use]
    pub fn from_action(trigger_event: ActionEvent, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_event: Some(trigger_event),
            error_type: "Error".to_string(),
            details: Some(details.into()),
            logs: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a standalone error event with no triggering action.
    #[must_use]
    pub fn new(error_type: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_event: None,
            error_type: error_type.into(),
            details: Some(details.into()),
            logs: None,
            timestamp: Utc::now(),
        }
    }
}

/// Any event recordable against a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    /// An instrumented call that completed (or is in flight).
    Action(ActionEvent),
    /// A failure raised by an instrumented call.
    Error(ErrorEvent),
}

impl From<ActionEvent> for Event {
    fn from(event: ActionEvent) -> Self {
        Self::Action(event)
    }
}

impl From<ErrorEvent> for Event {
    fn from(event: ErrorEvent) -> Self {
        Self::Error(event)
    }
}
