//! Core building blocks for agent telemetry.
//!
//! This crate provides the fundamental pieces:
//! - `ActionEvent` / `ErrorEvent` - structured records of instrumented calls
//! - `Session` - event buffer, tag set and end state for one logical run
//! - `ClientConfiguration` - resolved client settings
//! - Collaborator traits for transport, host-environment fingerprinting,
//!   agent resolution and framework detection

pub mod config;
pub mod event;
pub mod host_env;
pub mod session;
pub mod traits;
pub mod transport;

pub use config::{ClientConfiguration, ConfigOverrides, ConfigurationError};
pub use event::{ActionEvent, ErrorEvent, Event};
pub use host_env::{HostEnv, SystemHostEnv};
pub use session::{EndState, InvalidEndState, Session, SessionError, TokenCost};
pub use traits::{
    AgentId, AgentResolver, FrameworkDetector, FrameworkProfile, HostEnvResolver, SessionId,
    SessionSummary, Transport,
};
pub use transport::{NullTransport, RecordingTransport};
