//! Concurrency and pacing gate for outbound calls to one external service.
//!
//! Admission is FIFO: the limiter is built on a fair [`Semaphore`], so the
//! first caller to block is the first to be admitted when a slot frees.
//! Once admitted, a caller additionally waits until at least `min_delay`
//! has passed since the previous admitted start.
//!
//! Limiters obtained through [`RateLimiter::for_service`] are process-wide:
//! every provider instance talking to the same service shares one gate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use lazy_static::lazy_static;
use log::debug;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep_until, Instant};

use crate::errors::FetchError;
use crate::provider::RateLimit;

lazy_static! {
    static ref SERVICE_LIMITERS: StdMutex<HashMap<String, Arc<RateLimiter>>> =
        StdMutex::new(HashMap::new());
}

/// Per-service rate limiter.
pub struct RateLimiter {
    service: String,
    limit: RateLimit,
    slots: Semaphore,
    /// Start time of the most recently admitted operation.
    last_start: Mutex<Option<Instant>>,
    waiting: AtomicUsize,
}

/// Decrements the waiting counter even if the caller is cancelled mid-wait.
struct WaitGuard<'a>(&'a AtomicUsize);

impl<'a> WaitGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateLimiter {
    /// Create a limiter with explicit limits.
    pub fn new(service: impl Into<String>, limit: RateLimit) -> Self {
        let permits = limit.max_concurrency.max(1);
        Self {
            service: service.into(),
            limit,
            slots: Semaphore::new(permits),
            last_start: Mutex::new(None),
            waiting: AtomicUsize::new(0),
        }
    }

    /// The shared limiter for `service`, created with the service's fixed
    /// limits on first use.
    pub fn for_service(service: &str) -> Arc<Self> {
        let mut limiters = SERVICE_LIMITERS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        limiters
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(Self::new(service, RateLimit::for_service(service))))
            .clone()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn limit(&self) -> &RateLimit {
        &self.limit
    }

    /// Run `operation` once a slot is free and the pacing delay has elapsed.
    ///
    /// The slot is released when the operation finishes, whether it
    /// succeeded, failed, or was dropped.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let permit = {
            let _waiting = WaitGuard::enter(&self.waiting);
            self.slots
                .acquire()
                .await
                .map_err(|_| FetchError::LimiterClosed {
                    provider: self.service.clone(),
                })?
        };

        self.pace().await;

        let result = operation().await;
        drop(permit);
        result
    }

    /// Number of operations currently admitted.
    pub fn in_flight(&self) -> usize {
        self.limit.max_concurrency.max(1) - self.slots.available_permits()
    }

    /// Number of callers waiting for a slot.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Reject all current and future waiters with [`FetchError::LimiterClosed`].
    ///
    /// Operations already admitted run to completion.
    pub fn close(&self) {
        self.slots.close();
    }

    async fn pace(&self) {
        // Held across the sleep so that concurrently admitted callers are
        // spaced one after another rather than all waking together.
        let mut last_start = self.last_start.lock().await;

        if let Some(previous) = *last_start {
            // Never wait longer than one spacing interval, even if the
            // recorded start came from a clock that ran ahead.
            let now = Instant::now();
            let wait = (previous + self.limit.min_delay)
                .saturating_duration_since(now)
                .min(self.limit.min_delay);
            if !wait.is_zero() {
                debug!(
                    "Rate limiter: waiting {:?} before next '{}' call",
                    wait, self.service
                );
                sleep_until(now + wait).await;
            }
        }

        *last_start = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    fn limiter(concurrency: usize, delay_ms: u64) -> RateLimiter {
        RateLimiter::new("test", RateLimit::new(concurrency, delay_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_slot_runs_operations_one_at_a_time() {
        let limiter = limiter(1, 0);
        let events = Arc::new(StdMutex::new(Vec::new()));

        let run = |name: &'static str| {
            let events = events.clone();
            let limiter = &limiter;
            async move {
                limiter
                    .execute(|| async {
                        events.lock().unwrap().push(format!("{}-start", name));
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        events.lock().unwrap().push(format!("{}-end", name));
                        Ok(())
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run("a"), run("b"));
        assert!(a.is_ok());
        assert!(b.is_ok());

        let events = events.lock().unwrap().clone();
        assert_eq!(events, vec!["a-start", "a-end", "b-start", "b-end"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_are_spaced_by_min_delay() {
        let limiter = limiter(5, 100);
        let starts = Arc::new(StdMutex::new(Vec::new()));

        let calls = (0..3).map(|_| {
            let starts = starts.clone();
            let limiter = &limiter;
            async move {
                limiter
                    .execute(|| async {
                        starts.lock().unwrap().push(Instant::now());
                        Ok(())
                    })
                    .await
            }
        });
        futures::future::join_all(calls).await;

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 3);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_admitted_in_fifo_order() {
        let limiter = limiter(1, 0);
        let order = Arc::new(StdMutex::new(Vec::new()));

        let calls = ["first", "second", "third", "fourth"].into_iter().map(|name| {
            let order = order.clone();
            let limiter = &limiter;
            async move {
                limiter
                    .execute(|| async {
                        order.lock().unwrap().push(name);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(())
                    })
                    .await
            }
        });
        futures::future::join_all(calls).await;

        assert_eq!(
            order.lock().unwrap().clone(),
            vec!["first", "second", "third", "fourth"]
        );
    }

    #[tokio::test]
    async fn test_failure_releases_slot() {
        let limiter = limiter(1, 0);

        let result: Result<(), FetchError> = limiter
            .execute(|| async {
                Err(FetchError::Network {
                    provider: "test".to_string(),
                    message: "boom".to_string(),
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(limiter.in_flight(), 0);

        let value = limiter.execute(|| async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_limiters_are_shared_across_instances() {
        let first = RateLimiter::for_service("shared-pacing-test");
        let second = RateLimiter::for_service("shared-pacing-test");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.limit(), &RateLimit::default());

        let starts = Arc::new(StdMutex::new(Vec::new()));
        let run = |limiter: Arc<RateLimiter>| {
            let starts = starts.clone();
            async move {
                limiter
                    .execute(|| async {
                        starts.lock().unwrap().push(Instant::now());
                        Ok(())
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(first), run(second));
        assert!(a.is_ok());
        assert!(b.is_ok());

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 2);
        let gap = if starts[1] > starts[0] {
            starts[1] - starts[0]
        } else {
            starts[0] - starts[1]
        };
        assert!(gap >= RateLimit::default().min_delay);
    }

    #[test]
    fn test_distinct_services_get_distinct_limiters() {
        let notion = RateLimiter::for_service("notion");
        let attio = RateLimiter::for_service("attio");
        assert!(!Arc::ptr_eq(&notion, &attio));
        assert_eq!(notion.service(), "notion");
        assert_eq!(notion.limit(), &RateLimit::for_service("notion"));
    }

    #[tokio::test]
    async fn test_closed_limiter_rejects_callers() {
        let limiter = limiter(1, 0);
        limiter.close();

        let result = limiter.execute(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(FetchError::LimiterClosed { .. })));
    }
}
