//! Record-around-call instrumentation.
//!
//! Wraps a caller-supplied operation so each invocation is timed and
//! recorded as an [`ActionEvent`], with failures recorded as
//! [`ErrorEvent`]s referencing the in-flight action. The original call
//! contract is preserved: arguments are the caller's business, the return
//! value passes through untouched, and errors are never swallowed.
//!
//! There is no signature reflection in Rust, so the wrapped operation's
//! parameters are declared once at wrap time as a [`ParamSpec`] and the
//! per-call values arrive as [`CallArgs`]. Binding precedence is keyword
//! over positional over declared default.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use agent_telemetry_core::{ActionEvent, ErrorEvent, Event, Session};

use crate::registry::{Client, ClientError};

/// A declared parameter of a wrapped operation.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    default: Option<Value>,
}

impl Param {
    /// A parameter with no default value.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// A parameter with a declared default.
    #[must_use]
    pub fn with_default(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            default: Some(default),
        }
    }
}

/// Declared parameters of a wrapped operation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    params: Vec<Param>,
}

impl ParamSpec {
    /// Declare the wrapped operation's parameters.
    #[must_use]
    pub fn new(params: impl IntoIterator<Item = Param>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }

    /// An operation with no declared parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve call arguments: defaults, overlaid by positional values in
    /// declaration order, overlaid by keyword values.
    fn bind(
        &self,
        positional: &[Value],
        keyword: &[(String, Value)],
    ) -> std::collections::HashMap<String, Value> {
        let mut bound = std::collections::HashMap::new();
        for param in &self.params {
            if let Some(default) = &param.default {
                bound.insert(param.name.clone(), default.clone());
            }
        }
        for (param, value) in self.params.iter().zip(positional) {
            bound.insert(param.name.clone(), value.clone());
        }
        for (name, value) in keyword {
            bound.insert(name.clone(), value.clone());
        }
        bound
    }
}

/// Arguments for one invocation of a wrapped operation.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
    session: Option<Arc<Session>>,
}

impl CallArgs {
    /// No arguments, ambient session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Append a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.keyword.push((name.into(), value));
        self
    }

    /// Record against an explicit session, bypassing ambient resolution.
    #[must_use]
    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }
}

/// A wrapped operation: action name plus declared parameters.
#[derive(Debug, Clone)]
pub struct Instrumented {
    action_type: String,
    params: ParamSpec,
}

impl Instrumented {
    /// Wrap an operation.
    #[must_use]
    pub fn new(action_type: impl Into<String>, params: ParamSpec) -> Self {
        Self {
            action_type: action_type.into(),
            params,
        }
    }

    /// Begin a recorded invocation: bind arguments, stamp the start time and
    /// the calling agent, and resolve where the event will be recorded.
    ///
    /// # Errors
    /// Fails with `ClientError::MultiSession` - before the wrapped operation
    /// runs - when no explicit session was given and more than one session
    /// is open.
    pub fn begin<'c>(&self, client: &'c Client, args: CallArgs) -> Result<ActionGuard<'c>, ClientError> {
        let CallArgs {
            positional,
            keyword,
            session,
        } = args;

        if session.is_none() && client.open_session_count() > 1 {
            return Err(ClientError::MultiSession);
        }

        let event = ActionEvent::new(&self.action_type)
            .with_params(self.params.bind(&positional, &keyword))
            .with_agent(client.agent_resolver().current_agent());

        Ok(ActionGuard {
            client,
            session,
            event,
        })
    }

    /// Invoke a synchronous operation, recording its outcome.
    ///
    /// # Errors
    /// Returns the wrapped operation's error unchanged, or the session
    /// ambiguity error converted into the caller's error type.
    pub fn call<T, E, F>(&self, client: &Client, args: CallArgs, f: F) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display + From<ClientError>,
        F: FnOnce() -> Result<T, E>,
    {
        let guard = self.begin(client, args)?;
        guard.capture(f())
    }

    /// Invoke an asynchronous operation, recording its outcome.
    ///
    /// The future is not polled until the ambiguity check has passed; the
    /// only suspension points are the wrapped operation's own.
    ///
    /// # Errors
    /// Returns the wrapped operation's error unchanged, or the session
    /// ambiguity error converted into the caller's error type.
    pub async fn call_async<T, E, Fut>(
        &self,
        client: &Client,
        args: CallArgs,
        fut: Fut,
    ) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display + From<ClientError>,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.begin(client, args)?;
        guard.capture(fut.await)
    }
}

/// An in-flight recorded invocation.
///
/// Created by [`Instrumented::begin`]; consumed by [`ActionGuard::capture`]
/// with the wrapped operation's result.
pub struct ActionGuard<'c> {
    client: &'c Client,
    session: Option<Arc<Session>>,
    event: ActionEvent,
}

impl ActionGuard<'_> {
    /// Record the outcome of the wrapped operation and pass it through.
    ///
    /// Successful results are serialized onto the action event (plural
    /// returns surface as an ordered JSON array, and a `screenshot` field is
    /// lifted onto the event). Failures produce an error event referencing
    /// the in-flight action; the caller's error is returned unchanged.
    pub fn capture<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display,
    {
        let Self {
            client,
            session,
            mut event,
        } = self;

        match result {
            Ok(value) => {
                let returns = match serde_json::to_value(&value) {
                    Ok(Value::Null) => None,
                    Ok(v) => Some(v),
                    Err(e) => {
                        warn!(error = %e, action = %event.action_type, "return value not serializable");
                        None
                    }
                };
                event.complete(returns);
                dispatch(client, session.as_ref(), Event::Action(event));
                Ok(value)
            }
            Err(error) => {
                let error_event = ErrorEvent::from_action(event, error.to_string());
                dispatch(client, session.as_ref(), Event::Error(error_event));
                Err(error)
            }
        }
    }
}

/// Record against the explicit session when given, ambiently otherwise.
/// The wrapped operation already produced a value that must be returned, so
/// resolution failures here are logged and the event dropped.
fn dispatch(client: &Client, session: Option<&Arc<Session>>, event: Event) {
    let outcome = match session {
        Some(session) => session.record(event).map_err(|e| e.to_string()),
        None => client.record(event).map_err(|e| e.to_string()),
    };
    if let Err(error) = outcome {
        warn!(%error, "dropping instrumented event");
    }
}
