//! Session registry, shutdown interception and call instrumentation.
//!
//! Provides:
//! - `Client` - the session registry, built once per process
//! - `Instrumented` - record-around-call wrapping for sync and async calls
//! - `AgentScope` - thread-scoped agent attribution
//! - Shutdown interception (panic hook, Unix signals, drop finalizer)

pub mod agents;
pub mod instrument;
pub mod registry;

mod shutdown;

pub use agents::{AgentScope, ThreadAgentStack};
pub use instrument::{CallArgs, Instrumented, Param, ParamSpec};
pub use registry::{Client, ClientBuilder, ClientError};

pub use agent_telemetry_core::{
    ActionEvent, ClientConfiguration, EndState, ErrorEvent, Event, Session, TokenCost,
};
