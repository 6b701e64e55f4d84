//! Per-member upload rate limiting.
//!
//! Fixed-window counter: the first accepted upload opens a window of
//! `window` length, every accepted upload inside it counts towards
//! `ceiling`, and the bucket resets completely once the window has elapsed.
//! A member can therefore upload up to twice the ceiling in a short span
//! straddling a window boundary.
//!
//! Counters live behind [`AttemptStore`]. [`InMemoryAttemptStore`] keeps
//! them in this process only; running several API instances multiplies the
//! effective limit by the instance count unless a shared store is plugged in.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default per-member ceiling within one window.
pub const DEFAULT_UPLOAD_CEILING: u32 = 20;
/// Default window length.
pub const DEFAULT_UPLOAD_WINDOW: Duration = Duration::from_secs(60 * 60);
/// Default bound on tracked members. New members are denied while the table
/// is full of live buckets.
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Attempt counted; `remaining` further attempts fit in the current window.
    Allowed { remaining: u32 },
    /// Ceiling reached; the window resets after `retry_after`.
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Counter store for upload attempts.
///
/// `try_acquire` must check and increment atomically per key: concurrent
/// callers for the same key can never be admitted past `ceiling` within one
/// window.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn try_acquire(&self, key: &str, ceiling: u32, window: Duration) -> RateDecision;

    /// Drop buckets whose window has elapsed. Returns the number removed.
    async fn cleanup_expired(&self) -> usize;
}

#[derive(Debug, Clone)]
struct AttemptBucket {
    count: u32,
    reset_at: Instant,
}

/// Process-local attempt store.
pub struct InMemoryAttemptStore {
    buckets: Mutex<HashMap<String, AttemptBucket>>,
    max_entries: usize,
}

impl Default for InMemoryAttemptStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl InMemoryAttemptStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of tracked buckets, expired ones included.
    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.lock().await.is_empty()
    }

    /// Sweep expired buckets so a new key can be tracked.
    ///
    /// Live buckets are never evicted. If the table is still full, returns the
    /// time until the earliest live bucket expires.
    fn make_room(
        buckets: &mut HashMap<String, AttemptBucket>,
        max_entries: usize,
        now: Instant,
    ) -> Result<(), Duration> {
        buckets.retain(|_, bucket| bucket.reset_at > now);

        if buckets.len() < max_entries {
            return Ok(());
        }

        let earliest_reset = buckets
            .values()
            .map(|bucket| bucket.reset_at - now)
            .min()
            .unwrap_or_default();
        Err(earliest_reset)
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn try_acquire(&self, key: &str, ceiling: u32, window: Duration) -> RateDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        if let Some(bucket) = buckets.get_mut(key) {
            if now < bucket.reset_at {
                if bucket.count >= ceiling {
                    return RateDecision::Limited {
                        retry_after: bucket.reset_at - now,
                    };
                }
                bucket.count += 1;
                return RateDecision::Allowed {
                    remaining: ceiling - bucket.count,
                };
            }
            buckets.remove(key);
        }

        if ceiling == 0 {
            return RateDecision::Limited {
                retry_after: window,
            };
        }

        if buckets.len() >= self.max_entries {
            if let Err(retry_after) = Self::make_room(&mut buckets, self.max_entries, now) {
                tracing::warn!(
                    key = %key,
                    tracked_buckets = buckets.len(),
                    "Upload rate limit table full, denying untracked key"
                );
                return RateDecision::Limited { retry_after };
            }
        }

        buckets.insert(
            key.to_string(),
            AttemptBucket {
                count: 1,
                reset_at: now + window,
            },
        );

        RateDecision::Allowed {
            remaining: ceiling - 1,
        }
    }

    async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.reset_at > now);
        before - buckets.len()
    }
}

/// Upload rate limiter keyed by member identity.
#[derive(Clone)]
pub struct UploadRateLimiter {
    store: Arc<dyn AttemptStore>,
    ceiling: u32,
    window: Duration,
}

impl Default for UploadRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_CEILING, DEFAULT_UPLOAD_WINDOW)
    }
}

impl UploadRateLimiter {
    /// In-memory limiter with the default table bound.
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryAttemptStore::default()), ceiling, window)
    }

    pub fn with_store(store: Arc<dyn AttemptStore>, ceiling: u32, window: Duration) -> Self {
        Self {
            store,
            ceiling,
            window,
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count an upload attempt for `user_id` if the ceiling allows it.
    pub async fn check(&self, user_id: &str) -> RateDecision {
        let key = format!("upload:{}", user_id);
        let decision = self.store.try_acquire(&key, self.ceiling, self.window).await;

        if let RateDecision::Limited { retry_after } = decision {
            tracing::warn!(
                user_id = %user_id,
                ceiling = self.ceiling,
                retry_after_secs = retry_after.as_secs(),
                "Upload rate limit exceeded"
            );
        }

        decision
    }

    /// `true` if the upload may proceed. Denied attempts are not counted.
    pub async fn check_upload_rate(&self, user_id: &str) -> bool {
        self.check(user_id).await.is_allowed()
    }

    pub async fn cleanup_expired(&self) -> usize {
        let cleaned = self.store.cleanup_expired().await;
        if cleaned > 0 {
            tracing::debug!(
                buckets_cleaned = cleaned,
                "Cleaned up expired upload rate limit buckets"
            );
        }
        cleaned
    }

    /// Sweep expired buckets every `interval` until the handle is aborted.
    pub fn spawn_cleanup_task(&self, interval: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.cleanup_expired().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_twenty_allowed_then_denied() {
        let limiter = UploadRateLimiter::default();

        for i in 0..20 {
            assert!(limiter.check_upload_rate("user-1").await, "attempt {}", i + 1);
        }
        assert!(!limiter.check_upload_rate("user-1").await);
        assert!(!limiter.check_upload_rate("user-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let limiter = UploadRateLimiter::new(3, Duration::from_secs(60));

        assert_eq!(limiter.check("u").await, RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check("u").await, RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("u").await, RateDecision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check("u").await, RateDecision::Limited { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_users_are_independent() {
        let limiter = UploadRateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check_upload_rate("alice").await);
        assert!(!limiter.check_upload_rate("alice").await);
        assert!(limiter.check_upload_rate("bob").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_elapsing() {
        let limiter = UploadRateLimiter::default();

        for _ in 0..20 {
            assert!(limiter.check_upload_rate("user-1").await);
        }
        assert!(!limiter.check_upload_rate("user-1").await);

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        assert!(!limiter.check_upload_rate("user-1").await);

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        assert!(limiter.check_upload_rate("user-1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_starts_at_first_accepted_attempt() {
        let limiter = UploadRateLimiter::new(2, Duration::from_secs(100));

        assert!(limiter.check_upload_rate("u").await);
        tokio::time::advance(Duration::from_secs(90)).await;
        assert!(limiter.check_upload_rate("u").await);
        assert!(!limiter.check_upload_rate("u").await);

        // Later attempts do not extend the window.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.check_upload_rate("u").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_reflects_window_remainder() {
        let limiter = UploadRateLimiter::new(1, Duration::from_secs(3600));

        assert!(limiter.check_upload_rate("u").await);
        tokio::time::advance(Duration::from_secs(600)).await;

        match limiter.check("u").await {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(3000))
            }
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_never_exceed_ceiling() {
        let limiter = UploadRateLimiter::default();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_upload_rate("racer").await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exactly_ceiling_concurrent_checks_all_succeed() {
        let limiter = UploadRateLimiter::default();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_upload_rate("racer").await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert!(!limiter.check_upload_rate("racer").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_only_expired_buckets() {
        let store = Arc::new(InMemoryAttemptStore::default());
        let limiter =
            UploadRateLimiter::with_store(store.clone(), 5, Duration::from_secs(60));

        limiter.check("old").await;
        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.check("fresh").await;

        assert_eq!(store.len().await, 2);
        assert_eq!(limiter.cleanup_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_table_denies_new_keys_until_a_bucket_expires() {
        let store = Arc::new(InMemoryAttemptStore::new(2));
        let limiter = UploadRateLimiter::with_store(store.clone(), 1, Duration::from_secs(60));

        assert!(limiter.check_upload_rate("first").await);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.check_upload_rate("second").await);

        match limiter.check("third").await {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(59))
            }
            other => panic!("expected Limited, got {:?}", other),
        }
        assert_eq!(store.len().await, 2);
        assert!(!limiter.check_upload_rate("first").await);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(limiter.check_upload_rate("third").await);
        assert!(!limiter.check_upload_rate("second").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limited_member_stays_limited_when_table_fills() {
        let store = Arc::new(InMemoryAttemptStore::new(2));
        let limiter = UploadRateLimiter::with_store(store, 20, Duration::from_secs(3600));

        let mut successes = 0;
        for _ in 0..20 {
            if limiter.check_upload_rate("busy").await {
                successes += 1;
            }
        }
        tokio::time::advance(Duration::from_secs(1)).await;
        limiter.check("x1").await;
        limiter.check("x2").await;
        for _ in 0..20 {
            if limiter.check_upload_rate("busy").await {
                successes += 1;
            }
        }

        assert_eq!(successes, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_sweeps_periodically() {
        let store = Arc::new(InMemoryAttemptStore::default());
        let limiter = UploadRateLimiter::with_store(store.clone(), 5, Duration::from_secs(10));
        let handle = limiter.spawn_cleanup_task(Duration::from_secs(30));

        limiter.check("u").await;
        assert_eq!(store.len().await, 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(store.is_empty().await);

        handle.abort();
    }
}
