//! Client configuration resolution.

use thiserror::Error;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "AGENT_TELEMETRY_API_KEY";
/// Environment variable holding the parent organization key.
pub const ENV_PARENT_KEY: &str = "AGENT_TELEMETRY_PARENT_KEY";
/// Environment variable holding the backend endpoint.
pub const ENV_ENDPOINT: &str = "AGENT_TELEMETRY_API_ENDPOINT";
/// Environment variable opting out of host-environment data collection.
pub const ENV_DATA_OPT_OUT: &str = "AGENT_TELEMETRY_ENV_DATA_OPT_OUT";

const DEFAULT_ENDPOINT: &str = "https://api.agent-telemetry.dev";
const DEFAULT_MAX_WAIT_TIME_MS: u64 = 30_000;
const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no API key provided and {ENV_API_KEY} is not set")]
    MissingApiKey,
}

/// Explicit configuration overrides, applied over environment variables.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// API key for the telemetry backend.
    pub api_key: Option<String>,
    /// Organization key giving visibility of all user sessions.
    pub parent_key: Option<String>,
    /// Backend endpoint.
    pub endpoint: Option<String>,
    /// Maximum time to wait before flushing the event queue, milliseconds.
    pub max_wait_time_ms: Option<u64>,
    /// Maximum size of the event queue.
    pub max_queue_size: Option<usize>,
    /// Skip automatic session ends requested by framework integrations.
    pub skip_auto_end_session: Option<bool>,
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfiguration {
    /// API key for the telemetry backend.
    pub api_key: String,
    /// Organization key giving visibility of all user sessions.
    pub parent_key: Option<String>,
    /// Backend endpoint.
    pub endpoint: String,
    /// Maximum time to wait before flushing the event queue, milliseconds.
    pub max_wait_time_ms: u64,
    /// Maximum size of the event queue.
    pub max_queue_size: usize,
    /// Skip automatic session ends requested by framework integrations.
    pub skip_auto_end_session: bool,
}

impl ClientConfiguration {
    /// Resolve configuration: explicit overrides win over environment
    /// variables win over defaults.
    ///
    /// # Errors
    /// Returns `ConfigurationError::MissingApiKey` when no API key is
    /// available from either source.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigurationError> {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    fn resolve_with(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let api_key = overrides
            .api_key
            .or_else(|| env(ENV_API_KEY))
            .ok_or(ConfigurationError::MissingApiKey)?;

        Ok(Self {
            api_key,
            parent_key: overrides.parent_key.or_else(|| env(ENV_PARENT_KEY)),
            endpoint: overrides
                .endpoint
                .or_else(|| env(ENV_ENDPOINT))
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            max_wait_time_ms: overrides
                .max_wait_time_ms
                .unwrap_or(DEFAULT_MAX_WAIT_TIME_MS),
            max_queue_size: overrides.max_queue_size.unwrap_or(DEFAULT_MAX_QUEUE_SIZE),
            skip_auto_end_session: overrides.skip_auto_end_session.unwrap_or(false),
        })
    }
}
