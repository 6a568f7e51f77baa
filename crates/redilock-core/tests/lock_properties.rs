//! Lock protocol properties exercised against the in-memory backend
//!
//! Most tests drive time through `ManualClock`, so bounded waits and TTL
//! expiry run without real delays.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use redilock_core::{
    LockConfig, LockManager, LockToken, ManualClock, MemoryBackend, SystemClock, WaitPolicy,
};
use tokio::sync::Barrier;

const HOUR: Duration = Duration::from_secs(3600);

/// Two managers sharing one backend and one simulated clock, standing in for
/// two independent processes.
struct Cluster {
    clock: ManualClock,
    backend: Arc<MemoryBackend>,
}

impl Cluster {
    fn new() -> Self {
        let clock = ManualClock::new();
        let backend = Arc::new(MemoryBackend::with_clock(Arc::new(clock.clone())));
        Self { clock, backend }
    }

    fn client(&self) -> LockManager {
        LockManager::new(self.backend.clone()).with_clock(Arc::new(self.clock.clone()))
    }

    fn client_with_interval(&self, interval_ms: u64) -> LockManager {
        self.client()
            .with_config(LockConfig::default().with_retry_interval_ms(interval_ms))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_exclusion_under_concurrency() {
    let backend = Arc::new(MemoryBackend::new());
    let contenders = 32;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let manager = LockManager::new(backend.clone());
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                manager
                    .acquire_with("shared", HOUR, WaitPolicy::NoWait)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(token) = handle.await.unwrap() {
            winners.push(token);
        }
    }

    assert_eq!(winners.len(), 1, "exactly one contender must win");
    assert_eq!(backend.get("shared").as_deref(), Some(winners[0].as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_take_turns() {
    // Every waiter eventually gets the lock, and never two at once
    let backend = Arc::new(MemoryBackend::new());
    let manager = Arc::new(
        LockManager::new(backend.clone())
            .with_config(LockConfig::default().with_retry_interval_ms(5)),
    );
    let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let inside = inside.clone();
            tokio::spawn(async move {
                let token = manager
                    .acquire_with("turns", HOUR, WaitPolicy::Indefinite)
                    .await
                    .unwrap()
                    .unwrap();
                let concurrent = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(concurrent, 0, "two holders inside the critical section");
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                assert!(manager.release("turns", &token).await.unwrap());
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(manager.stats().acquisitions, 8);
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_tokens_are_pairwise_distinct() {
    let cluster = Cluster::new();
    let manager = cluster.client();
    let mut seen = HashSet::new();

    for i in 0..100 {
        let name = format!("lock-{}", i);
        let token = manager
            .acquire_with(&name, HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .unwrap();
        assert!(seen.insert(token));
    }

    for _ in 0..100 {
        let token = manager
            .acquire_with("same", HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .unwrap();
        assert!(manager.release("same", &token).await.unwrap());
        assert!(seen.insert(token));
    }

    assert_eq!(seen.len(), 200);
}

#[tokio::test]
async fn test_ttl_expiry_liberates_lock() {
    let cluster = Cluster::new();
    let holder = cluster.client();
    let other = cluster.client();

    let stale = holder
        .acquire_with("report", Duration::from_secs(5), WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    cluster.clock.advance(Duration::from_secs(4));
    assert!(
        other
            .acquire_with("report", Duration::from_secs(5), WaitPolicy::NoWait)
            .await
            .unwrap()
            .is_none()
    );

    cluster.clock.advance(Duration::from_secs(2));
    let fresh = other
        .acquire_with("report", Duration::from_secs(5), WaitPolicy::NoWait)
        .await
        .unwrap()
        .expect("lock must be free once the ttl elapsed");

    // The first holder overstayed its ttl: its release must not free the new hold
    assert!(!holder.release("report", &stale).await.unwrap());
    assert_eq!(cluster.backend.get("report").as_deref(), Some(fresh.as_str()));
}

#[tokio::test]
async fn test_wrong_token_release_keeps_lock() {
    let cluster = Cluster::new();
    let holder = cluster.client();
    let other = cluster.client();

    let _token = holder
        .acquire_with("report", HOUR, WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    assert!(
        !other
            .release("report", &LockToken::from("wrong-token"))
            .await
            .unwrap()
    );
    assert!(
        other
            .acquire_with("report", HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(other.stats().stale_releases, 1);
}

#[tokio::test]
async fn test_correct_token_release_frees_lock() {
    let cluster = Cluster::new();
    let holder = cluster.client();
    let other = cluster.client();

    let token = holder
        .acquire_with("report", HOUR, WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    assert!(holder.release("report", &token).await.unwrap());
    assert!(
        other
            .acquire_with("report", HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .is_some()
    );

    // A second release with the consumed token is a stale release
    assert!(!holder.release("report", &token).await.unwrap());
}

#[tokio::test]
async fn test_no_wait_returns_without_blocking() {
    let cluster = Cluster::new();
    let holder = cluster.client();
    let other = cluster.client();

    holder
        .acquire_with("report", HOUR, WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    assert!(
        other
            .acquire_with("report", HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(cluster.clock.elapsed(), Duration::ZERO);

    let stats = other.stats();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.contended, 1);
}

#[tokio::test]
async fn test_bounded_wait_respects_deadline() {
    for (interval_ms, timeout_ms) in [(100, 1000), (300, 1000), (250, 100), (100, 0)] {
        let cluster = Cluster::new();
        let holder = cluster.client();
        let waiter = cluster.client_with_interval(interval_ms);

        holder
            .acquire_with("report", HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .unwrap();

        let timeout = Duration::from_millis(timeout_ms);
        let result = waiter
            .acquire_with("report", HOUR, WaitPolicy::BoundedWait(timeout))
            .await
            .unwrap();
        assert!(result.is_none());

        let elapsed = cluster.clock.elapsed();
        assert!(
            elapsed >= timeout,
            "gave up after {:?}, before the {:?} timeout",
            elapsed,
            timeout
        );
        assert!(
            elapsed <= timeout + Duration::from_millis(interval_ms),
            "overshot the {:?} timeout: {:?}",
            timeout,
            elapsed
        );
    }
}

#[tokio::test]
async fn test_bounded_wait_acquires_when_lock_expires() {
    let cluster = Cluster::new();
    let holder = cluster.client();
    let waiter = cluster.client();

    holder
        .acquire_with("report", Duration::from_millis(450), WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    let token = waiter
        .acquire_with("report", HOUR, WaitPolicy::bounded_ms(1000))
        .await
        .unwrap();
    assert!(token.is_some());

    let elapsed = cluster.clock.elapsed();
    assert!(elapsed >= Duration::from_millis(450));
    assert!(elapsed < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_bounded_wait_with_real_clock() {
    let backend = Arc::new(MemoryBackend::new());
    let holder = LockManager::new(backend.clone());
    let waiter = LockManager::new(backend.clone())
        .with_clock(Arc::new(SystemClock))
        .with_config(LockConfig::default().with_retry_interval_ms(50));

    holder
        .acquire_with("report", HOUR, WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    let started = Instant::now();
    let result = waiter
        .acquire_with("report", HOUR, WaitPolicy::bounded_ms(300))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(result.is_none());
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_extend_keeps_lock_past_original_ttl() {
    let cluster = Cluster::new();
    let holder = cluster.client();
    let other = cluster.client();

    let token = holder
        .acquire_with("report", Duration::from_secs(5), WaitPolicy::NoWait)
        .await
        .unwrap()
        .unwrap();

    cluster.clock.advance(Duration::from_secs(4));
    assert!(
        holder
            .extend("report", &token, Duration::from_secs(5))
            .await
            .unwrap()
    );

    cluster.clock.advance(Duration::from_secs(4));
    assert!(
        other
            .acquire_with("report", HOUR, WaitPolicy::NoWait)
            .await
            .unwrap()
            .is_none()
    );

    cluster.clock.advance(Duration::from_secs(2));
    assert!(
        !holder
            .extend("report", &token, Duration::from_secs(5))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_end_to_end_scenario() -> anyhow::Result<()> {
    let cluster = Cluster::new();
    let lock = cluster.client();
    let name = "my_lock_417";

    // Step 1: lock for 5 minutes
    let token = lock
        .acquire(name, Duration::from_secs(300))
        .await?
        .expect("first acquire must succeed");

    // Step 2: lock again without waiting
    let result = lock
        .acquire_with(name, Duration::from_secs(5), WaitPolicy::NoWait)
        .await?;
    assert!(result.is_none());

    // Step 3: lock again with a 1s wait
    let before = cluster.clock.elapsed();
    let result = lock
        .acquire_with(name, Duration::from_secs(5), WaitPolicy::bounded_ms(1000))
        .await?;
    assert!(result.is_none());
    let waited = cluster.clock.elapsed() - before;
    assert!(waited >= Duration::from_secs(1));
    assert!(waited <= Duration::from_millis(1100));

    // Step 4: unlock with the wrong key
    assert!(!lock.release(name, &LockToken::from("wrong-key")).await?);

    // Step 5: unlock with the correct key
    assert!(lock.release(name, &token).await?);

    // Step 6: lock for 5s with the default (indefinite) wait
    let again = lock.acquire(name, Duration::from_secs(5)).await?;
    assert!(again.is_some());
    assert_ne!(again, Some(token));

    Ok(())
}
