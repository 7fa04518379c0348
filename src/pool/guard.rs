//! Borrow guard for pooled agents.

use std::ops::Deref;
use std::sync::Arc;

use crate::agent::Agent;

use super::{Lease, PoolInner, SlotKind};

/// An agent borrowed from an [`AgentPool`](super::AgentPool).
///
/// Dropping the guard returns the agent. A guard dropped while its thread
/// is panicking, or explicitly [discarded](PooledAgent::discard), counts as
/// a crash: the agent is thrown away and its slot rebuilt from the factory.
pub struct PooledAgent {
    agent: Agent,
    kind: SlotKind,
    crashed: bool,
    /// Set once the agent left the guard without a checkin.
    detached: bool,
    pool: Arc<PoolInner>,
}

impl PooledAgent {
    pub(crate) fn new(lease: Lease, pool: Arc<PoolInner>) -> Self {
        Self {
            agent: lease.agent,
            kind: lease.kind,
            crashed: false,
            detached: false,
            pool,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Replace the borrowed agent, typically with the value a run returned.
    pub fn set(&mut self, agent: Agent) {
        self.agent = agent;
    }

    /// Whether this agent lives only until it is returned.
    pub fn is_overflow(&self) -> bool {
        self.kind == SlotKind::Overflow
    }

    /// Give the agent back as crashed.
    pub fn discard(mut self) {
        self.crashed = true;
    }

    /// Unwrap the guard without checking the agent in. The caller owns the
    /// slot bookkeeping from here on.
    pub(crate) fn into_lease(mut self) -> Lease {
        self.detached = true;
        let placeholder = self.agent.reset();
        Lease {
            agent: std::mem::replace(&mut self.agent, placeholder),
            kind: self.kind,
        }
    }
}

impl Deref for PooledAgent {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.agent
    }
}

impl Drop for PooledAgent {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let crashed = self.crashed || std::thread::panicking();
        let placeholder = self.agent.reset();
        let agent = std::mem::replace(&mut self.agent, placeholder);
        PoolInner::checkin(&self.pool, agent, self.kind, crashed);
    }
}

impl std::fmt::Debug for PooledAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledAgent")
            .field("agent", &self.agent)
            .field("overflow", &self.is_overflow())
            .finish()
    }
}
