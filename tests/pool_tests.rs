//! Tests for the agent worker pool.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::MockProvider;
use tandem::agent::{Agent, AgentConfig};
use tandem::error::TandemError;
use tandem::pool::{AgentPool, CheckoutMode, PoolConfig};

/// Factory bookkeeping shared with the test body.
#[derive(Clone, Default)]
struct FactoryState {
    built: Arc<AtomicUsize>,
    broken: Arc<AtomicBool>,
}

impl FactoryState {
    fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

fn pool_with(size: usize, max_overflow: usize) -> (AgentPool, FactoryState, Arc<MockProvider>) {
    let provider = MockProvider::new();
    let config = Arc::new(
        AgentConfig::builder()
            .client(provider.clone())
            .model("mock-model")
            .build(),
    );
    let factory = FactoryState::default();
    let factory_state = factory.clone();
    let pool = AgentPool::new(PoolConfig { size, max_overflow }, move || {
        if factory_state.broken.load(Ordering::SeqCst) {
            return Err(TandemError::Configuration("factory offline".into()));
        }
        factory_state.built.fetch_add(1, Ordering::SeqCst);
        Ok(Agent::from_shared(Arc::clone(&config)))
    })
    .unwrap();
    (pool, factory, provider)
}

fn blocking(ms: u64) -> CheckoutMode {
    CheckoutMode::Blocking {
        timeout: Duration::from_millis(ms),
    }
}

#[tokio::test]
async fn pool_builds_its_agents_up_front() {
    let (pool, factory, _) = pool_with(3, 2);

    let stats = pool.stats();

    assert_eq!(factory.built(), 3);
    assert_eq!(stats.size, 3);
    assert_eq!(stats.available, 3);
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.max_overflow, 2);
}

#[tokio::test]
async fn failing_factory_fails_pool_creation() {
    let result = AgentPool::new(PoolConfig::default(), || {
        Err(TandemError::Configuration("no credentials".into()))
    });

    assert!(matches!(result, Err(TandemError::Configuration(_))));
}

#[tokio::test]
async fn blocked_checkout_is_served_on_checkin() {
    let (pool, _, _) = pool_with(1, 0);
    let held = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.checkout(blocking(5_000)).await.map(|agent| agent.memory().len()) })
    };
    while pool.stats().waiting == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(pool.stats().in_use, 1);

    pool.checkin(held);

    assert_eq!(waiter.await.unwrap().unwrap(), 0);
    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use, stats.waiting), (1, 0, 0));
}

#[tokio::test]
async fn abandoned_checkout_returns_the_agent_it_was_handed() {
    let (pool, _, _) = pool_with(1, 0);
    let held = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.checkout(blocking(5_000)).await.map(|_| ()) })
    };
    while pool.stats().waiting == 0 {
        tokio::task::yield_now().await;
    }
    pool.checkin(held);
    waiter.abort();
    let _ = waiter.await;

    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use, stats.waiting), (1, 0, 0));
    assert!(pool.checkout(CheckoutMode::NonBlocking).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn checkout_cancelled_by_an_outer_timeout_keeps_capacity() {
    let (pool, _, _) = pool_with(1, 0);
    let held = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();

    let outer = tokio::time::timeout(Duration::from_millis(100), pool.checkout(blocking(5_000))).await;
    assert!(outer.is_err());
    assert_eq!(pool.stats().waiting, 0);

    drop(held);

    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use, stats.waiting), (1, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn blocked_checkout_times_out() {
    let (pool, _, _) = pool_with(1, 0);
    let _held = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();

    let err = pool.checkout(blocking(250)).await.unwrap_err();

    assert!(matches!(err, TandemError::CheckoutTimeout(250)));
    assert_eq!(pool.stats().waiting, 0);
}

#[tokio::test]
async fn non_blocking_checkout_fails_when_exhausted() {
    let (pool, _, _) = pool_with(1, 0);
    let _held = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();

    let err = pool.checkout(CheckoutMode::NonBlocking).await.unwrap_err();

    assert!(matches!(err, TandemError::NoAgentsAvailable));
}

#[tokio::test]
async fn waiters_are_served_in_arrival_order() {
    let (pool, _, _) = pool_with(1, 0);
    let held = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3 {
        let worker_pool = pool.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let agent = worker_pool.checkout(blocking(5_000)).await.unwrap();
            order.lock().unwrap().push(id);
            tokio::task::yield_now().await;
            drop(agent);
        }));
        while pool.stats().waiting < id + 1 {
            tokio::task::yield_now().await;
        }
    }

    drop(held);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn overflow_agents_extend_capacity_temporarily() {
    let (pool, factory, _) = pool_with(1, 1);

    let first = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    let second = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    assert!(!first.is_overflow());
    assert!(second.is_overflow());
    assert_eq!(pool.stats().overflow, 1);
    assert_eq!(factory.built(), 2);

    drop(second);
    drop(first);

    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use, stats.overflow), (1, 0, 0));
}

#[tokio::test]
async fn transaction_keeps_the_updated_agent() {
    let (pool, _, provider) = pool_with(1, 0);
    provider.queue_response("noted");

    let reply = pool
        .transaction(CheckoutMode::NonBlocking, |agent| async move {
            let (agent, reply) = agent.run("remember me").await?;
            Ok((agent, reply.text()))
        })
        .await
        .unwrap();

    assert_eq!(reply, "noted");
    let agent = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    assert_eq!(agent.memory().len(), 2);
}

#[tokio::test]
async fn failed_transaction_keeps_the_original_agent() {
    let (pool, factory, _) = pool_with(1, 0);

    let result: Result<(), _> = pool
        .transaction(CheckoutMode::NonBlocking, |agent| async move {
            let (_agent, _) = agent.run("lost").await?;
            Err(TandemError::InvalidState("changed my mind".into()))
        })
        .await;

    assert!(matches!(result, Err(TandemError::InvalidState(_))));
    assert_eq!(factory.built(), 1);
    let agent = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    assert!(agent.memory().is_empty());
}

#[tokio::test]
async fn panicking_transaction_replaces_the_agent() {
    let (pool, factory, _) = pool_with(1, 0);

    let result: Result<(), _> = pool
        .transaction(CheckoutMode::NonBlocking, |agent| async move {
            if agent.memory().is_empty() {
                panic!("kaboom");
            }
            Ok((agent, ()))
        })
        .await;

    match result {
        Err(TandemError::AgentCrashed(reason)) => assert_eq!(reason, "kaboom"),
        other => panic!("expected a crash, got {other:?}"),
    }
    assert_eq!(factory.built(), 2);
    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use), (1, 0));
}

#[tokio::test]
async fn guard_dropped_by_a_panicking_task_counts_as_a_crash() {
    let (pool, factory, _) = pool_with(2, 0);

    let worker = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let _agent = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
            panic!("worker died");
        })
    };

    assert!(worker.await.unwrap_err().is_panic());
    assert_eq!(factory.built(), 3);
    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use), (2, 0));
}

#[tokio::test]
async fn lost_slots_are_rebuilt_on_later_checkouts() {
    let (pool, factory, _) = pool_with(1, 0);
    factory.set_broken(true);

    let crashed: Result<(), _> = pool
        .transaction(CheckoutMode::NonBlocking, |agent| async move {
            if agent.memory().is_empty() {
                panic!("lost");
            }
            Ok((agent, ()))
        })
        .await;
    assert!(matches!(crashed, Err(TandemError::AgentCrashed(_))));
    assert_eq!(pool.stats().available, 0);
    assert!(matches!(
        pool.checkout(CheckoutMode::NonBlocking).await,
        Err(TandemError::NoAgentsAvailable)
    ));

    factory.set_broken(false);
    let agent = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();

    assert!(!agent.is_overflow());
    assert_eq!(factory.built(), 2);
}

#[tokio::test]
async fn rebuilt_slots_go_to_queued_checkouts_first() {
    let (pool, factory, _) = pool_with(2, 0);
    let first = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    let _second = pool.checkout(CheckoutMode::NonBlocking).await.unwrap();
    factory.set_broken(true);
    first.discard();

    let queued = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.checkout(blocking(5_000)).await.map(|agent| agent.is_overflow()) })
    };
    while pool.stats().waiting == 0 {
        tokio::task::yield_now().await;
    }
    factory.set_broken(false);

    let late = pool.checkout(CheckoutMode::NonBlocking).await;

    assert!(matches!(late, Err(TandemError::NoAgentsAvailable)));
    assert!(!queued.await.unwrap().unwrap());
    assert_eq!(factory.built(), 3);
}

#[tokio::test]
async fn concurrent_transactions_never_share_an_agent() {
    let (pool, _, _) = pool_with(2, 1);
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..12 {
        let pool = pool.clone();
        let active = active.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            pool.transaction(blocking(5_000), |agent| async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                let (agent, _) = agent.run(format!("job {i}")).await?;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok((agent, ()))
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    let stats = pool.stats();
    assert_eq!((stats.available, stats.in_use, stats.overflow, stats.waiting), (2, 0, 0, 0));
}
