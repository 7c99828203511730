//! Process-exit interception.
//!
//! Three mutually exclusive paths force open sessions to a terminal state:
//! dropping the [`Client`](crate::Client) (normal exit, `Indeterminate`),
//! SIGINT/SIGTERM (`Fail`, then exit 0 - the signal is handled, not a
//! crash), and panics (`Fail` with payload and backtrace, then the previous
//! panic hook runs so default reporting is preserved). All three funnel
//! through `Shared::end_open_sessions`, which is a no-op for sessions a user
//! already ended.

use std::sync::{Arc, Once, Weak};

use tracing::info;

use agent_telemetry_core::EndState;

use crate::registry::Shared;

static INSTALL: Once = Once::new();

/// Install the interceptors, at most once per process.
pub(crate) fn install(shared: &Arc<Shared>) {
    INSTALL.call_once(|| {
        install_panic_hook(Arc::downgrade(shared));
        spawn_signal_listener(Arc::downgrade(shared));
    });
}

fn install_panic_hook(shared: Weak<Shared>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Some(shared) = shared.upgrade() {
            let backtrace = std::backtrace::Backtrace::force_capture();
            shared.end_open_sessions(EndState::Fail, &format!("{panic_info}: {backtrace}"));
        }
        // Default reporting and the non-zero exit path still apply.
        previous(panic_info);
    }));
}

#[cfg(unix)]
fn spawn_signal_listener(shared: Weak<Shared>) {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::debug;

    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!("no tokio runtime, signal interception disabled");
        return;
    };

    handle.spawn(async move {
        let (Ok(mut sigint), Ok(mut sigterm)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) else {
            debug!("failed to register signal handlers");
            return;
        };

        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };

        if let Some(shared) = shared.upgrade() {
            handle_signal(&shared, name);
        }
        // The signal is considered handled, not propagated as a crash.
        std::process::exit(0);
    });
}

#[cfg(not(unix))]
fn spawn_signal_listener(_shared: Weak<Shared>) {}

/// End every open session because the named signal arrived.
pub(crate) fn handle_signal(shared: &Shared, name: &str) {
    info!(signal = name, "signal received, ending open sessions");
    shared.end_open_sessions(EndState::Fail, &format!("Signal {name} received"));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agent_telemetry_core::transport::RecordingTransport;

    use super::*;
    use crate::Client;

    #[test]
    fn test_signal_fails_open_sessions() {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::builder()
            .api_key("test-key")
            .transport(transport)
            .install_shutdown_hooks(false)
            .build()
            .unwrap();
        let open = client.start_session(None, None).unwrap();
        let already_ended = client.start_session(None, None).unwrap();
        already_ended.end(EndState::Success, Some("manual"));

        handle_signal(client.shared(), "SIGINT");

        assert_eq!(open.end_state(), Some(EndState::Fail));
        assert_eq!(
            open.end_state_reason().as_deref(),
            Some("Signal SIGINT received")
        );
        // Idempotent against a session the user already ended.
        assert_eq!(already_ended.end_state(), Some(EndState::Success));
    }
}
