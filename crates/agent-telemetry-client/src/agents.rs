//! Thread-scoped ambient agent attribution.
//!
//! The explicit stand-in for call-stack inspection: code running on behalf
//! of an agent enters an [`AgentScope`], and events recorded on that thread
//! while the scope is alive are attributed to that agent.

use std::cell::RefCell;
use std::marker::PhantomData;

use agent_telemetry_core::traits::{AgentId, AgentResolver};

thread_local! {
    static AGENT_STACK: RefCell<Vec<AgentId>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard attributing this thread's instrumented calls to an agent.
///
/// Scopes nest; the innermost one wins. Not `Send`: the scope belongs to
/// the thread that entered it.
pub struct AgentScope {
    _not_send: PhantomData<*const ()>,
}

impl AgentScope {
    /// Enter a scope for the given agent.
    #[must_use]
    pub fn enter(agent_id: AgentId) -> Self {
        AGENT_STACK.with_borrow_mut(|stack| stack.push(agent_id));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for AgentScope {
    fn drop(&mut self) {
        AGENT_STACK.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

/// Resolver reading the innermost `AgentScope` on the calling thread.
#[derive(Debug, Default, Clone)]
pub struct ThreadAgentStack;

impl AgentResolver for ThreadAgentStack {
    fn current_agent(&self) -> Option<AgentId> {
        AGENT_STACK.with_borrow(|stack| stack.last().copied())
    }
}
