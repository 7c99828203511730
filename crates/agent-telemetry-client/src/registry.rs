//! The session registry: owns active sessions, resolves ambient calls and
//! guarantees orderly shutdown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agent_telemetry_core::config::{self, ConfigOverrides};
use agent_telemetry_core::traits::{
    AgentId, AgentResolver, FrameworkDetector, HostEnvResolver, NoFrameworks, SessionId, Transport,
};
use agent_telemetry_core::transport::NullTransport;
use agent_telemetry_core::{
    ClientConfiguration, ConfigurationError, EndState, Event, Session, SystemHostEnv, TokenCost,
};

use crate::agents::ThreadAgentStack;
use crate::shutdown;

/// Registry error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no active session")]
    NoSession,
    #[error(
        "multiple sessions are active; call methods on an explicit Session \
         handle instead of the ambient client"
    )]
    MultiSession,
    #[error("invalid session id {0:?}")]
    InvalidSessionId(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// State shared between the client, its shutdown hooks and the signal task.
pub(crate) struct Shared {
    config: RwLock<ClientConfiguration>,
    sessions: Mutex<Vec<Arc<Session>>>,
    pending_tags: Mutex<Option<Vec<String>>>,
    transport: Arc<dyn Transport>,
    host_env: Arc<dyn HostEnvResolver>,
    agents: Arc<dyn AgentResolver>,
    env_data_opt_out: bool,
    instrument_llm_calls: bool,
}

impl Shared {
    // Shutdown hooks may run on a thread that observed a panic while another
    // thread held the lock; the inner vec is still coherent.
    fn sessions_lock(&self) -> MutexGuard<'_, Vec<Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_lock(&self) -> MutexGuard<'_, Option<Vec<String>>> {
        self.pending_tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the unambiguous session, pruning sessions ended out-of-band.
    pub(crate) fn safe_get(&self) -> Result<Arc<Session>, ClientError> {
        let mut sessions = self.sessions_lock();
        sessions.retain(|s| s.is_open());
        match sessions.as_slice() {
            [] => Err(ClientError::NoSession),
            [one] => Ok(Arc::clone(one)),
            _ => Err(ClientError::MultiSession),
        }
    }

    fn open_session_count(&self) -> usize {
        let mut sessions = self.sessions_lock();
        sessions.retain(|s| s.is_open());
        sessions.len()
    }

    /// Force every still-open session to a terminal state, best-effort.
    ///
    /// Re-ending a session a user already ended is a no-op inside
    /// `Session::end`, so the three exit paths cannot double-finalize.
    pub(crate) fn end_open_sessions(&self, end_state: EndState, reason: &str) {
        let sessions: Vec<Arc<Session>> = self.sessions_lock().clone();
        for session in sessions {
            if session.end(end_state, Some(reason)).is_some() {
                info!(session_id = %session.id(), %end_state, "session force-ended");
            }
        }
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    overrides: ConfigOverrides,
    tags: Option<Vec<String>>,
    instrument_llm_calls: bool,
    auto_start_session: bool,
    inherited_session_id: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    host_env: Option<Arc<dyn HostEnvResolver>>,
    agents: Option<Arc<dyn AgentResolver>>,
    detector: Option<Arc<dyn FrameworkDetector>>,
    install_shutdown_hooks: bool,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            overrides: ConfigOverrides::default(),
            tags: None,
            instrument_llm_calls: true,
            auto_start_session: false,
            inherited_session_id: None,
            transport: None,
            host_env: None,
            agents: None,
            detector: None,
            install_shutdown_hooks: true,
        }
    }

    /// API key for the telemetry backend.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.overrides.api_key = Some(key.into());
        self
    }

    /// Organization key giving visibility of all user sessions.
    #[must_use]
    pub fn parent_key(mut self, key: impl Into<String>) -> Self {
        self.overrides.parent_key = Some(key.into());
        self
    }

    /// Backend endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.overrides.endpoint = Some(endpoint.into());
        self
    }

    /// Maximum time to wait before flushing the event queue, milliseconds.
    #[must_use]
    pub const fn max_wait_time_ms(mut self, ms: u64) -> Self {
        self.overrides.max_wait_time_ms = Some(ms);
        self
    }

    /// Maximum size of the event queue.
    #[must_use]
    pub const fn max_queue_size(mut self, size: usize) -> Self {
        self.overrides.max_queue_size = Some(size);
        self
    }

    /// Skip automatic session ends requested by framework integrations.
    #[must_use]
    pub const fn skip_auto_end_session(mut self, skip: bool) -> Self {
        self.overrides.skip_auto_end_session = Some(skip);
        self
    }

    /// Tags for the next session.
    #[must_use]
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Whether an LLM-instrumentation collaborator should be active.
    #[must_use]
    pub const fn instrument_llm_calls(mut self, instrument: bool) -> Self {
        self.instrument_llm_calls = instrument;
        self
    }

    /// Start a session as soon as the client is built.
    #[must_use]
    pub const fn auto_start_session(mut self, auto_start: bool) -> Self {
        self.auto_start_session = auto_start;
        self
    }

    /// Adopt an existing session id instead of generating one.
    #[must_use]
    pub fn inherited_session_id(mut self, id: impl Into<String>) -> Self {
        self.inherited_session_id = Some(id.into());
        self
    }

    /// Event sink. Defaults to a transport that drops everything.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Host-environment fingerprinting collaborator.
    #[must_use]
    pub fn host_env(mut self, host_env: Arc<dyn HostEnvResolver>) -> Self {
        self.host_env = Some(host_env);
        self
    }

    /// Agent attribution collaborator. Defaults to thread-scoped resolution.
    #[must_use]
    pub fn agent_resolver(mut self, agents: Arc<dyn AgentResolver>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Framework-detection collaborator.
    #[must_use]
    pub fn framework_detector(mut self, detector: Arc<dyn FrameworkDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Whether to install the process-exit interceptors. Defaults to true;
    /// disable in embedded or test contexts.
    #[must_use]
    pub const fn install_shutdown_hooks(mut self, install: bool) -> Self {
        self.install_shutdown_hooks = install;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Fails with a configuration error when no API key can be resolved, or
    /// with a validation error when the inherited session id is malformed.
    /// No client state exists after a failure.
    pub fn build(self) -> Result<Client, ClientError> {
        let configuration = ClientConfiguration::resolve(self.overrides)?;

        // Validate before any session can be constructed.
        if let Some(id) = &self.inherited_session_id {
            Uuid::parse_str(id).map_err(|_| ClientError::InvalidSessionId(id.clone()))?;
        }

        let env_data_opt_out = std::env::var(config::ENV_DATA_OPT_OUT)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let detector = self
            .detector
            .unwrap_or_else(|| Arc::new(NoFrameworks) as Arc<dyn FrameworkDetector>);

        let mut instrument_llm_calls = self.instrument_llm_calls;
        let mut auto_start_session = self.auto_start_session;
        let mut framework_tag = None;
        for profile in detector.known_frameworks() {
            if detector.is_loaded(&profile.name) {
                debug!(framework = %profile.name, "known framework detected");
                framework_tag = Some(profile.name);
                instrument_llm_calls = profile.instrument_llm_calls;
                auto_start_session = profile.auto_start_session;
                break;
            }
        }

        let shared = Arc::new(Shared {
            config: RwLock::new(configuration),
            sessions: Mutex::new(Vec::new()),
            pending_tags: Mutex::new(None),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(NullTransport) as Arc<dyn Transport>),
            host_env: self
                .host_env
                .unwrap_or_else(|| Arc::new(SystemHostEnv) as Arc<dyn HostEnvResolver>),
            agents: self
                .agents
                .unwrap_or_else(|| Arc::new(ThreadAgentStack) as Arc<dyn AgentResolver>),
            env_data_opt_out,
            instrument_llm_calls,
        });

        if self.install_shutdown_hooks {
            shutdown::install(&shared);
        }

        let client = Client { shared };

        if let Some(tag) = framework_tag {
            client.add_tags(&[tag])?;
        }

        if auto_start_session {
            client.start_session(self.tags, self.inherited_session_id.as_deref())?;
        } else if let Some(tags) = self.tags {
            client.add_tags(&tags)?;
        }

        Ok(client)
    }
}

/// The session registry.
///
/// Owns every active session, resolves "the current session" for ambient
/// calls and guarantees that all sessions reach a terminal state. Built once
/// per process and injected where needed; dropping it is the normal-exit
/// finalization path.
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Start building a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn agent_resolver(&self) -> &Arc<dyn AgentResolver> {
        &self.shared.agents
    }

    /// Whether an LLM-instrumentation collaborator should be active, after
    /// framework-detection adjustments.
    #[must_use]
    pub fn instruments_llm_calls(&self) -> bool {
        self.shared.instrument_llm_calls
    }

    /// Start a new session.
    ///
    /// Tags default to any pending tags buffered while no session was open.
    ///
    /// # Errors
    /// Fails with a validation error when `inherited_session_id` is not a
    /// valid UUID; no session is constructed in that case.
    pub fn start_session(
        &self,
        tags: Option<Vec<String>>,
        inherited_session_id: Option<&str>,
    ) -> Result<Arc<Session>, ClientError> {
        let id = match inherited_session_id {
            Some(raw) => {
                Uuid::parse_str(raw).map_err(|_| ClientError::InvalidSessionId(raw.to_string()))?
            }
            None => Uuid::new_v4(),
        };

        let tags = tags
            .or_else(|| self.shared.pending_lock().clone())
            .unwrap_or_default();

        let host_env = self
            .shared
            .host_env
            .fingerprint(self.shared.env_data_opt_out);

        let session = Arc::new(Session::new(
            id,
            tags,
            host_env,
            Arc::clone(&self.shared.transport),
        ));

        info!(session_id = %id, "session started");
        self.shared.sessions_lock().push(Arc::clone(&session));
        Ok(session)
    }

    /// End the unambiguous session.
    ///
    /// `end_state` must be one of `Success`, `Fail` or `Indeterminate`; any
    /// other value logs a warning and leaves the session open, reporting an
    /// unknown cost.
    ///
    /// # Errors
    /// Fails when zero or more than one session is open.
    pub fn end_session(
        &self,
        end_state: &str,
        end_state_reason: Option<&str>,
        video: Option<&str>,
    ) -> Result<TokenCost, ClientError> {
        let session = self.shared.safe_get()?;

        let Ok(state) = end_state.parse::<EndState>() else {
            warn!(end_state, "invalid end state, session left open");
            return Ok(TokenCost::Unknown);
        };

        if let Some(url) = video {
            session.set_video(url);
        }

        let cost = session
            .end(state, end_state_reason)
            .unwrap_or(TokenCost::Unknown);
        match cost {
            TokenCost::Unknown => info!("could not determine cost of run"),
            TokenCost::Usd { amount } => info!("this run's cost ${amount:.6}"),
        }

        self.shared.sessions_lock().retain(|s| s.id() != session.id());
        Ok(cost)
    }

    /// End the unambiguous session on behalf of a framework integration.
    ///
    /// A no-op when the configuration says to skip automatic ends.
    ///
    /// # Errors
    /// Same failure modes as [`Client::end_session`].
    pub fn auto_end_session(
        &self,
        end_state: &str,
        end_state_reason: Option<&str>,
        video: Option<&str>,
    ) -> Result<TokenCost, ClientError> {
        let skip = self
            .shared
            .config
            .read()
            .map(|c| c.skip_auto_end_session)
            .unwrap_or(false);
        if skip {
            debug!("skipping automatic session end per configuration");
            return Ok(TokenCost::Unknown);
        }
        self.end_session(end_state, end_state_reason, video)
    }

    /// Record an event against the unambiguous session.
    ///
    /// # Errors
    /// Fails when zero or more than one session is open.
    pub fn record(&self, event: Event) -> Result<(), ClientError> {
        let session = self.shared.safe_get()?;
        if let Err(e) = session.record(event) {
            // Lost a race with an exit path; bookkeeping proceeds.
            warn!(error = %e, "dropping event recorded against a closing session");
        }
        Ok(())
    }

    /// Append tags to the open session, or buffer them for the next one.
    ///
    /// # Errors
    /// Fails when more than one session is open.
    pub fn add_tags(&self, tags: &[String]) -> Result<(), ClientError> {
        if self.shared.open_session_count() == 0 {
            let mut pending = self.shared.pending_lock();
            match pending.as_mut() {
                Some(existing) => {
                    for tag in tags {
                        if !existing.contains(tag) {
                            existing.push(tag.clone());
                        }
                    }
                }
                None => *pending = Some(tags.to_vec()),
            }
            return Ok(());
        }

        let session = self.shared.safe_get()?;
        session.add_tags(tags);
        Ok(())
    }

    /// Replace the open session's tags, or the buffered pending tags.
    ///
    /// # Errors
    /// Fails when more than one session is open.
    pub fn set_tags(&self, tags: &[String]) -> Result<(), ClientError> {
        match self.shared.safe_get() {
            Ok(session) => {
                session.set_tags(tags);
                Ok(())
            }
            Err(ClientError::NoSession) => {
                *self.shared.pending_lock() = Some(tags.to_vec());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Register an agent with an explicit session, or the unambiguous one.
    ///
    /// Generates an id when none is supplied.
    ///
    /// # Errors
    /// Fails when no explicit session is given and zero or more than one
    /// session is open.
    pub fn create_agent(
        &self,
        name: &str,
        agent_id: Option<AgentId>,
        session: Option<&Session>,
    ) -> Result<AgentId, ClientError> {
        let agent_id = agent_id.unwrap_or_else(Uuid::new_v4);
        match session {
            Some(session) => session.create_agent(name, agent_id),
            None => self.shared.safe_get()?.create_agent(name, agent_id),
        }
        Ok(agent_id)
    }

    /// End every open session and clear the registry.
    pub fn end_all_sessions(&self) {
        let sessions: Vec<Arc<Session>> = self.shared.sessions_lock().drain(..).collect();
        for session in sessions {
            session.end(EndState::Indeterminate, None);
        }
    }

    /// Ids of the currently open sessions, in creation order.
    #[must_use]
    pub fn current_session_ids(&self) -> Vec<SessionId> {
        self.shared
            .sessions_lock()
            .iter()
            .filter(|s| s.is_open())
            .map(|s| s.id())
            .collect()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn open_session_count(&self) -> usize {
        self.shared.open_session_count()
    }

    /// The resolved API key.
    #[must_use]
    pub fn api_key(&self) -> String {
        self.shared
            .config
            .read()
            .map(|c| c.api_key.clone())
            .unwrap_or_default()
    }

    /// The parent organization key, if any.
    #[must_use]
    pub fn parent_key(&self) -> Option<String> {
        self.shared
            .config
            .read()
            .ok()
            .and_then(|c| c.parent_key.clone())
    }

    /// Set the parent organization key.
    pub fn set_parent_key(&self, parent_key: impl Into<String>) {
        if let Ok(mut config) = self.shared.config.write() {
            config.parent_key = Some(parent_key.into());
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Normal-exit finalization: anything still open ends Indeterminate.
        self.shared.end_open_sessions(
            EndState::Indeterminate,
            "process exited without calling end_session()",
        );
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("open_sessions", &self.open_session_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use agent_telemetry_core::traits::FrameworkProfile;
    use agent_telemetry_core::transport::RecordingTransport;
    use agent_telemetry_core::ActionEvent;

    use super::*;

    fn test_client(transport: Arc<RecordingTransport>) -> Client {
        Client::builder()
            .api_key("test-key")
            .transport(transport)
            .install_shutdown_hooks(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_open_count_tracks_starts_and_ends() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        assert_eq!(client.open_session_count(), 0);

        client.start_session(None, None).unwrap();
        assert_eq!(client.open_session_count(), 1);

        client.end_session("Success", None, None).unwrap();
        assert_eq!(client.open_session_count(), 0);
    }

    #[test]
    fn test_ambient_resolution_zero_one_many() {
        let client = test_client(Arc::new(RecordingTransport::new()));

        assert!(matches!(
            client.record(ActionEvent::new("step").into()),
            Err(ClientError::NoSession)
        ));

        client.start_session(None, None).unwrap();
        client.record(ActionEvent::new("step").into()).unwrap();

        client.start_session(None, None).unwrap();
        assert!(matches!(
            client.record(ActionEvent::new("step").into()),
            Err(ClientError::MultiSession)
        ));
        assert!(matches!(
            client.end_session("Success", None, None),
            Err(ClientError::MultiSession)
        ));
    }

    #[test]
    fn test_out_of_band_end_is_pruned() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        let kept = client.start_session(None, None).unwrap();
        let ended = client.start_session(None, None).unwrap();

        ended.end(EndState::Success, None);
        // Ambiguity resolves after pruning the out-of-band end.
        client.record(ActionEvent::new("step").into()).unwrap();
        assert_eq!(kept.event_count(), 1);
    }

    #[test]
    fn test_invalid_end_state_leaves_session_open() {
        let transport = Arc::new(RecordingTransport::new());
        let client = test_client(Arc::clone(&transport));
        let session = client.start_session(None, None).unwrap();

        let cost = client.end_session("Maybe", None, None).unwrap();
        assert_eq!(cost, TokenCost::Unknown);
        assert!(session.is_open());
        assert!(transport.finalized().is_empty());
    }

    #[test]
    fn test_end_session_reports_cost_and_video() {
        let transport = Arc::new(RecordingTransport::with_cost(TokenCost::Usd {
            amount: 0.42,
        }));
        let client = test_client(Arc::clone(&transport));
        client.start_session(None, None).unwrap();

        let cost = client
            .end_session("Success", Some("done"), Some("https://rec.example/1"))
            .unwrap();
        assert_eq!(cost, TokenCost::Usd { amount: 0.42 });

        let summary = &transport.finalized()[0];
        assert_eq!(summary.end_state, Some(EndState::Success));
        assert_eq!(summary.end_state_reason.as_deref(), Some("done"));
        assert_eq!(summary.video.as_deref(), Some("https://rec.example/1"));
    }

    #[test]
    fn test_second_end_fails_with_no_session() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        client.start_session(None, None).unwrap();
        client.end_session("Success", None, None).unwrap();
        assert!(matches!(
            client.end_session("Success", None, None),
            Err(ClientError::NoSession)
        ));
    }

    #[test]
    fn test_pending_tags_apply_to_next_session() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        client.add_tags(&["a".to_string()]).unwrap();
        client.add_tags(&["a".to_string(), "b".to_string()]).unwrap();

        let session = client.start_session(None, None).unwrap();
        assert_eq!(session.tags(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_set_tags_replaces_pending_or_session() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        client.add_tags(&["a".to_string()]).unwrap();
        client.set_tags(&["z".to_string()]).unwrap();
        let session = client.start_session(None, None).unwrap();
        assert_eq!(session.tags(), vec!["z".to_string()]);

        client.set_tags(&["live".to_string()]).unwrap();
        assert_eq!(session.tags(), vec!["live".to_string()]);
    }

    #[test]
    fn test_tags_on_open_session() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        let session = client.start_session(Some(vec!["a".to_string()]), None).unwrap();
        client.add_tags(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(session.tags(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_inherited_session_id() {
        let client = test_client(Arc::new(RecordingTransport::new()));

        assert!(matches!(
            client.start_session(None, Some("not-a-uuid")),
            Err(ClientError::InvalidSessionId(_))
        ));
        assert_eq!(client.open_session_count(), 0);

        let id = Uuid::new_v4();
        let session = client
            .start_session(None, Some(&id.to_string()))
            .unwrap();
        assert_eq!(session.id(), id);
    }

    #[test]
    fn test_create_agent() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        let session = client.start_session(None, None).unwrap();

        let generated = client.create_agent("researcher", None, None).unwrap();
        assert_eq!(
            session.agents().get(&generated).map(String::as_str),
            Some("researcher")
        );

        let other = client.start_session(None, None).unwrap();
        // Ambient resolution is ambiguous now; explicit handle still works.
        assert!(matches!(
            client.create_agent("writer", None, None),
            Err(ClientError::MultiSession)
        ));
        let explicit = client.create_agent("writer", None, Some(&other)).unwrap();
        assert!(other.agents().contains_key(&explicit));
    }

    #[test]
    fn test_end_all_sessions_clears_registry() {
        let transport = Arc::new(RecordingTransport::new());
        let client = test_client(Arc::clone(&transport));
        client.start_session(None, None).unwrap();
        client.start_session(None, None).unwrap();

        client.end_all_sessions();
        assert_eq!(client.open_session_count(), 0);
        assert!(client.current_session_ids().is_empty());
        assert_eq!(transport.finalized().len(), 2);
    }

    #[test]
    fn test_drop_finalizes_open_sessions() {
        let transport = Arc::new(RecordingTransport::new());
        let client = test_client(Arc::clone(&transport));
        let session = client.start_session(None, None).unwrap();

        drop(client);
        assert_eq!(session.end_state(), Some(EndState::Indeterminate));
        assert_eq!(
            session.end_state_reason().as_deref(),
            Some("process exited without calling end_session()")
        );
    }

    #[test]
    fn test_drop_does_not_re_end_closed_sessions() {
        let transport = Arc::new(RecordingTransport::new());
        let client = test_client(Arc::clone(&transport));
        let session = client.start_session(None, None).unwrap();
        session.end(EndState::Success, Some("manual"));

        drop(client);
        assert_eq!(session.end_state(), Some(EndState::Success));
        assert_eq!(session.end_state_reason().as_deref(), Some("manual"));
        assert_eq!(transport.finalized().len(), 1);
    }

    #[test]
    fn test_missing_api_key_fails_build() {
        // No override and no env var in test environments.
        let result = Client::builder()
            .install_shutdown_hooks(false)
            .build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    struct FakeDetector;

    impl FrameworkDetector for FakeDetector {
        fn known_frameworks(&self) -> Vec<FrameworkProfile> {
            vec![FrameworkProfile {
                name: "crewlike".to_string(),
                instrument_llm_calls: false,
                auto_start_session: true,
            }]
        }

        fn is_loaded(&self, name: &str) -> bool {
            name == "crewlike"
        }
    }

    #[test]
    fn test_framework_detection_adjusts_defaults() {
        let client = Client::builder()
            .api_key("test-key")
            .framework_detector(Arc::new(FakeDetector))
            .install_shutdown_hooks(false)
            .build()
            .unwrap();

        assert!(!client.instruments_llm_calls());
        assert_eq!(client.open_session_count(), 1);
        let ids = client.current_session_ids();
        let session = client.shared().safe_get().unwrap();
        assert_eq!(ids, vec![session.id()]);
        assert!(session.tags().contains(&"crewlike".to_string()));
    }

    #[test]
    fn test_skip_auto_end_session() {
        let client = Client::builder()
            .api_key("test-key")
            .skip_auto_end_session(true)
            .install_shutdown_hooks(false)
            .build()
            .unwrap();
        let session = client.start_session(None, None).unwrap();

        let cost = client.auto_end_session("Success", None, None).unwrap();
        assert_eq!(cost, TokenCost::Unknown);
        assert!(session.is_open());

        client.end_session("Success", None, None).unwrap();
        assert!(!session.is_open());
    }

    #[test]
    fn test_parent_key_mutation() {
        let client = test_client(Arc::new(RecordingTransport::new()));
        assert_eq!(client.api_key(), "test-key");
        assert!(client.parent_key().is_none());
        client.set_parent_key("org-key");
        assert_eq!(client.parent_key().as_deref(), Some("org-key"));
    }
}
