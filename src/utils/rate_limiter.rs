/// Token bucket rate limiter shared by concurrent provider calls
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let capacity = requests_per_second.max(1) as f64;
        RateLimiter {
            capacity,
            refill_per_sec: capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Try to acquire a token, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        self.wait_time().await.is_none()
    }

    /// Wait until a token is available, then acquire it
    pub async fn acquire(&self) {
        while let Some(wait) = self.wait_time().await {
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token if one is available, otherwise report how long until one is
    async fn wait_time(&self) -> Option<Duration> {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - bucket.tokens;
            Some(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(2); // 2 requests per second

        // Should get 2 tokens immediately
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);

        // Third should fail
        assert!(!limiter.try_acquire().await);

        // acquire() waits for the refill instead of failing
        let started = Instant::now();
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
