//! Agent worker pool.
//!
//! A fixed set of pre-built agents plus a bounded number of short-lived
//! overflow agents. One mutex guards all bookkeeping; agents themselves are
//! used outside the lock by whoever borrowed them. Waiters are served in
//! arrival order.

pub mod guard;

pub use guard::PooledAgent;

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::agent::Agent;
use crate::agent_loop::tooling::panic_message;
use crate::error::{Result, TandemError};

/// Builds a fresh agent for an empty slot.
pub type AgentFactory = Arc<dyn Fn() -> Result<Agent> + Send + Sync>;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Agents created up front and kept for the pool's lifetime.
    pub size: usize,
    /// Extra agents created on demand when every regular agent is busy.
    #[serde(default)]
    pub max_overflow: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            max_overflow: 0,
        }
    }
}

/// What checkout does when nothing is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Fail immediately with [`TandemError::NoAgentsAvailable`].
    NonBlocking,
    /// Queue behind earlier waiters for at most `timeout`.
    Blocking { timeout: Duration },
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: usize,
    /// Idle regular agents.
    pub available: usize,
    /// Borrowed agents, regular and overflow.
    pub in_use: usize,
    /// Borrowed overflow agents.
    pub overflow: usize,
    pub max_overflow: usize,
    /// Queued blocking checkouts.
    pub waiting: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotKind {
    Regular,
    Overflow,
}

pub(crate) struct Lease {
    agent: Agent,
    kind: SlotKind,
}

struct Waiter {
    id: u64,
    /// Leases travel wrapped in a guard so a checkout abandoned after the
    /// hand-off still returns its agent when the receiver is dropped.
    sender: oneshot::Sender<PooledAgent>,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<Agent>,
    /// Borrowed regular agents.
    in_use: usize,
    /// Borrowed overflow agents.
    overflow: usize,
    /// Regular slots whose agent crashed and could not be rebuilt yet.
    missing: usize,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

pub(crate) struct PoolInner {
    config: PoolConfig,
    factory: AgentFactory,
    state: Mutex<PoolState>,
}

/// Shared handle to a pool of agents.
#[derive(Clone)]
pub struct AgentPool {
    inner: Arc<PoolInner>,
}

impl AgentPool {
    /// Build the pool, creating `config.size` agents with `factory`.
    pub fn new<F>(config: PoolConfig, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<Agent> + Send + Sync + 'static,
    {
        if config.size == 0 {
            return Err(TandemError::InvalidArgument(
                "pool size must be at least 1".to_string(),
            ));
        }

        let factory: AgentFactory = Arc::new(factory);
        let idle = (0..config.size)
            .map(|_| factory())
            .collect::<Result<VecDeque<_>>>()?;
        debug!(size = config.size, max_overflow = config.max_overflow, "agent pool started");

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                state: Mutex::new(PoolState {
                    idle,
                    ..PoolState::default()
                }),
            }),
        })
    }

    pub fn config(&self) -> PoolConfig {
        self.inner.config
    }

    /// Borrow an agent.
    pub async fn checkout(&self, mode: CheckoutMode) -> Result<PooledAgent> {
        let (mut queued, timeout) = {
            let mut state = self.inner.lock();
            self.inner.replenish(&mut state);
            // Rebuilt slots belong to earlier waiters first.
            self.inner.serve_waiters(&mut state);

            if state.waiters.is_empty() {
                if let Some(lease) = self.inner.take_available(&mut state)? {
                    return Ok(PooledAgent::new(lease, Arc::clone(&self.inner)));
                }
            }

            let timeout = match mode {
                CheckoutMode::NonBlocking => return Err(TandemError::NoAgentsAvailable),
                CheckoutMode::Blocking { timeout } => timeout,
            };
            let (sender, receiver) = oneshot::channel();
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.waiters.push_back(Waiter { id, sender });
            debug!(waiter = id, waiting = state.waiters.len(), "checkout queued");
            (
                QueuedCheckout {
                    pool: &self.inner,
                    id,
                    receiver,
                },
                timeout,
            )
        };

        match tokio::time::timeout(timeout, &mut queued.receiver).await {
            Ok(Ok(agent)) => Ok(agent),
            Ok(Err(_)) => Err(TandemError::InvalidState(
                "pool dropped a queued checkout".to_string(),
            )),
            Err(_) => {
                // Not queued anymore means an agent was sent before we got the lock.
                if !queued.dequeue() {
                    if let Ok(agent) = queued.receiver.try_recv() {
                        return Ok(agent);
                    }
                }
                Err(TandemError::CheckoutTimeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Return a borrowed agent. Equivalent to dropping the guard.
    pub fn checkin(&self, agent: PooledAgent) {
        drop(agent);
    }

    /// Run `f` on a borrowed agent and return it to the pool afterwards.
    ///
    /// `f` receives a copy of the agent. On success the agent it returns
    /// replaces the pooled one; on error the pooled agent is kept as it was.
    /// A panic inside `f` retires the agent and yields
    /// [`TandemError::AgentCrashed`].
    pub async fn transaction<F, Fut, T>(&self, mode: CheckoutMode, f: F) -> Result<T>
    where
        F: FnOnce(Agent) -> Fut,
        Fut: Future<Output = Result<(Agent, T)>>,
    {
        let mut guard = self.checkout(mode).await?;
        let working = guard.agent().clone();

        match AssertUnwindSafe(async move { f(working).await })
            .catch_unwind()
            .await
        {
            Ok(Ok((agent, value))) => {
                guard.set(agent);
                Ok(value)
            }
            Ok(Err(err)) => Err(err),
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                guard.discard();
                Err(TandemError::AgentCrashed(reason))
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        PoolStats {
            size: self.inner.config.size,
            available: state.idle.len(),
            in_use: state.in_use + state.overflow,
            overflow: state.overflow,
            max_overflow: self.inner.config.max_overflow,
            waiting: state.waiters.len(),
        }
    }
}

impl std::fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A blocking checkout's place in the wait queue. Dropping it, including
/// when the checkout future is cancelled, leaves the queue.
struct QueuedCheckout<'a> {
    pool: &'a PoolInner,
    id: u64,
    receiver: oneshot::Receiver<PooledAgent>,
}

impl QueuedCheckout<'_> {
    /// Leave the queue. Returns false when the pool already served us.
    fn dequeue(&self) -> bool {
        let mut state = self.pool.lock();
        let before = state.waiters.len();
        state.waiters.retain(|waiter| waiter.id != self.id);
        state.waiters.len() != before
    }
}

impl Drop for QueuedCheckout<'_> {
    fn drop(&mut self) {
        // An agent already sent is checked in when `receiver` drops.
        self.dequeue();
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Rebuild regular agents lost to crashes.
    fn replenish(&self, state: &mut PoolState) {
        while state.missing > 0 {
            match (self.factory)() {
                Ok(agent) => {
                    state.missing -= 1;
                    state.idle.push_back(agent);
                    debug!(missing = state.missing, "replaced crashed agent");
                }
                Err(err) => {
                    warn!(error = %err, missing = state.missing, "agent factory failed; slot stays empty");
                    break;
                }
            }
        }
    }

    /// An idle agent, else a new overflow agent if the bound allows.
    fn take_available(&self, state: &mut PoolState) -> Result<Option<Lease>> {
        if let Some(agent) = state.idle.pop_front() {
            state.in_use += 1;
            return Ok(Some(Lease {
                agent,
                kind: SlotKind::Regular,
            }));
        }
        if state.overflow < self.config.max_overflow {
            let agent = (self.factory)()?;
            state.overflow += 1;
            debug!(overflow = state.overflow, "created overflow agent");
            return Ok(Some(Lease {
                agent,
                kind: SlotKind::Overflow,
            }));
        }
        Ok(None)
    }

    /// Hand freed capacity to queued checkouts, oldest first.
    fn serve_waiters(self: &Arc<Self>, state: &mut PoolState) {
        while let Some(waiter) = state.waiters.pop_front() {
            let lease = match self.take_available(state) {
                Ok(Some(lease)) => lease,
                Ok(None) => {
                    state.waiters.push_front(waiter);
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "could not create agent for queued checkout");
                    state.waiters.push_front(waiter);
                    return;
                }
            };
            let agent = PooledAgent::new(lease, Arc::clone(self));
            if let Err(agent) = waiter.sender.send(agent) {
                // The waiter gave up; undo the borrow and try the next one.
                self.release(state, agent.into_lease());
            }
        }
    }

    fn release(&self, state: &mut PoolState, lease: Lease) {
        match lease.kind {
            SlotKind::Regular => {
                state.in_use -= 1;
                state.idle.push_front(lease.agent);
            }
            SlotKind::Overflow => state.overflow -= 1,
        }
    }

    /// Take back a borrowed agent. Crashed agents are replaced, overflow
    /// agents are retired.
    pub(crate) fn checkin(self: &Arc<Self>, agent: Agent, kind: SlotKind, crashed: bool) {
        let mut state = self.lock();
        match (kind, crashed) {
            (SlotKind::Regular, false) => {
                state.in_use -= 1;
                state.idle.push_back(agent);
            }
            (SlotKind::Regular, true) => {
                state.in_use -= 1;
                drop(agent);
                match (self.factory)() {
                    Ok(replacement) => state.idle.push_back(replacement),
                    Err(err) => {
                        state.missing += 1;
                        error!(error = %err, "failed to replace crashed agent; retrying on next checkout");
                    }
                }
            }
            (SlotKind::Overflow, _) => {
                state.overflow -= 1;
                drop(agent);
            }
        }
        if crashed {
            error!(slot = ?kind, "pooled agent crashed while borrowed");
        }
        self.serve_waiters(&mut state);
    }
}
