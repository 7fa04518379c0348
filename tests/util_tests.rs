//! Tests for utility modules (retry, timeout).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tandem::error::TandemError;
use tandem::util::retry::RetryPolicy;
use tandem::util::timeout::{maybe_with_timeout, with_timeout};

#[tokio::test(start_paused = true)]
async fn retry_policy_retries_retryable_errors_until_success() {
    let policy = RetryPolicy::new(4, Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(100))
        .without_jitter();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_task = attempts.clone();

    let task = tokio::spawn(async move {
        policy
            .execute(|| {
                let attempts = attempts_for_task.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(TandemError::Timeout(100))
                    } else {
                        Ok::<_, TandemError>("ok")
                    }
                }
            })
            .await
    });

    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_secs(1)).await;
    let result = task.await.unwrap();

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_stops_immediately_for_non_retryable_errors() {
    let policy = RetryPolicy::new(5, Duration::from_millis(1));
    let attempts = AtomicUsize::new(0);

    let result = policy
        .execute(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(TandemError::Authentication("bad".into())) }
        })
        .await;

    assert!(matches!(result, Err(TandemError::Authentication(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_returns_last_error_when_attempts_are_exhausted() {
    let policy = RetryPolicy::new(3, Duration::from_millis(10)).without_jitter();
    let attempts = AtomicUsize::new(0);

    let result = policy
        .execute(|| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(TandemError::api(503, format!("attempt {attempt}"))) }
        })
        .await;

    match result {
        Err(TandemError::Api { message, .. }) => assert_eq!(message, "attempt 2"),
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_policy_with_zero_attempts_still_runs_once() {
    let policy = RetryPolicy::new(0, Duration::from_millis(10));
    let attempts = AtomicUsize::new(0);

    let result = policy
        .execute(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, TandemError>(7) }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn jittered_delays_stay_within_a_quarter_of_nominal() {
    let policy = RetryPolicy::new(2, Duration::from_millis(400));
    let started = tokio::time::Instant::now();

    let _ = policy
        .execute(|| async { Err::<(), _>(TandemError::Network("flaky".into())) })
        .await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(500), "{elapsed:?}");
}

#[test]
fn unbounded_max_delay_saturates_instead_of_overflowing() {
    let policy = RetryPolicy::new(300, Duration::from_secs(1)).with_max_delay(Duration::MAX);

    assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    assert_eq!(policy.delay_for(200), Duration::MAX);
}

#[tokio::test(start_paused = true)]
async fn with_timeout_reports_the_limit_in_millis() {
    let result = with_timeout(Duration::from_millis(1_500), async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, TandemError>(())
    })
    .await;

    assert!(matches!(result, Err(TandemError::Timeout(1_500))));
}

#[tokio::test(start_paused = true)]
async fn maybe_with_timeout_without_a_limit_waits() {
    let result = maybe_with_timeout(None, async {
        tokio::time::sleep(Duration::from_secs(120)).await;
        Ok::<_, TandemError>("done")
    })
    .await;

    assert_eq!(result.unwrap(), "done");
}
