//! Token-bucket admission control, one bucket per provider.
//!
//! Tokens refill continuously: fractional tokens accumulate between calls
//! and a call is admitted only when at least one whole token is available.
//! A rejected call has no side effect on the bucket.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use civicbridge_config::RateLimitConfig;

/// Absorbs float drift from many small refills.
const EPSILON: f64 = 1e-9;

/// Bucket state guarded by the limiter's mutex.
#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// A thread-safe token bucket.
///
/// `try_acquire` never blocks beyond a short critical section and is safe to
/// call from many tasks at once.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_per_sec: f64,
    /// `None` means admission control is disabled.
    bucket: Option<Mutex<Bucket>>,
}

impl RateLimiter {
    /// Create a full bucket of `capacity` tokens refilling at
    /// `refill_per_minute`. A capacity of 0 disables limiting.
    pub fn new(capacity: u32, refill_per_minute: u32) -> Self {
        if capacity == 0 {
            return Self::unlimited();
        }
        Self {
            capacity,
            refill_per_sec: f64::from(refill_per_minute) / 60.0,
            bucket: Some(Mutex::new(Bucket {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            })),
        }
    }

    /// Build a limiter from a `[rate_limit]` table.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_per_minute)
    }

    /// A limiter that admits everything.
    pub fn unlimited() -> Self {
        Self {
            capacity: 0,
            refill_per_sec: 0.0,
            bucket: None,
        }
    }

    /// Whether admission control is disabled.
    pub fn is_unlimited(&self) -> bool {
        self.bucket.is_none()
    }

    /// Maximum whole tokens the bucket holds.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one token if a whole one is available.
    pub fn try_acquire(&self) -> bool {
        let Some(ref bucket) = self.bucket else {
            return true;
        };
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, Instant::now());

        if bucket.tokens + EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// Whole tokens currently available (`u32::MAX` when unlimited).
    pub fn available(&self) -> u32 {
        let Some(ref bucket) = self.bucket else {
            return u32::MAX;
        };
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, Instant::now());
        (bucket.tokens + EPSILON).floor() as u32
    }

    /// Time until the next whole token, zero if one is available now and
    /// `Duration::MAX` if the bucket is empty and never refills.
    pub fn time_until_available(&self) -> Duration {
        let Some(ref bucket) = self.bucket else {
            return Duration::ZERO;
        };
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut bucket, Instant::now());

        if bucket.tokens + EPSILON >= 1.0 {
            return Duration::ZERO;
        }
        if self.refill_per_sec <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec)
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens =
            (bucket.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(f64::from(self.capacity));
        bucket.last_refill = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}
