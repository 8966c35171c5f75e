use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Per-domain minimum-interval limiter.
///
/// Owns one "next allowed request" slot per domain. The map is behind a mutex so
/// fetches for different domains may run concurrently, while requests to the same
/// domain are spaced at least `min_interval` apart. Cloning shares the state; create
/// one per process (or per research run) and hand it to every fetcher.
#[derive(Debug, Clone)]
pub struct DomainRateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl DomainRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                min_interval,
                next_slot: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    /// Wait until a request to `domain` is allowed, then claim the slot.
    pub async fn acquire(&self, domain: &str) {
        // Reserve under the lock, sleep outside it so other domains are not blocked.
        let wait_until = {
            let mut slots = self.inner.next_slot.lock().await;
            let now = Instant::now();
            let start = match slots.get(domain) {
                Some(next) if *next > now => *next,
                _ => now,
            };
            slots.insert(domain.to_string(), start + self.inner.min_interval);
            start
        };

        let now = Instant::now();
        if wait_until > now {
            let wait = wait_until - now;
            debug!(domain, wait_ms = wait.as_millis() as u64, "Throttling request");
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

impl Default for DomainRateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::constants::DEFAULT_MIN_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_domain_requests_are_spaced() {
        let limiter = DomainRateLimiter::new(Duration::from_millis(1000));
        let start = Instant::now();

        limiter.acquire("fest.de").await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.acquire("fest.de").await;
        assert!(start.elapsed() >= Duration::from_millis(1000));

        limiter.acquire("fest.de").await;
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn different_domains_do_not_wait_on_each_other() {
        let limiter = DomainRateLimiter::new(Duration::from_millis(1000));
        let start = Instant::now();

        limiter.acquire("a.de").await;
        limiter.acquire("b.de").await;
        limiter.acquire("c.de").await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_same_domain_callers_are_serialized() {
        let limiter = DomainRateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        let a = limiter.clone();
        let b = limiter.clone();
        let (ta, tb) = tokio::join!(
            async move {
                a.acquire("fest.de").await;
                start.elapsed()
            },
            async move {
                b.acquire("fest.de").await;
                start.elapsed()
            }
        );
        let (first, second) = if ta <= tb { (ta, tb) } else { (tb, ta) };
        assert!(first < Duration::from_millis(10));
        assert!(second >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_elapsed_means_no_wait() {
        let limiter = DomainRateLimiter::new(Duration::from_millis(200));
        limiter.acquire("fest.de").await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let before = Instant::now();
        limiter.acquire("fest.de").await;
        assert!(before.elapsed() < Duration::from_millis(10));
    }
}
