//! Token-bucket admission control for tool calls
//!
//! One call to [`RateLimiter::allow`] consumes exactly one token or is
//! rejected immediately; nothing blocks or queues. Buckets start full.
//!
//! # Example
//! ```no_run
//! use spamc_rs::config::RateLimitConfig;
//! use spamc_rs::security::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(&RateLimitConfig::default());
//!
//! if limiter.allow("scan_email").await.is_ok() {
//!     println!("Request allowed");
//! } else {
//!     println!("Rate limit exceeded");
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::{Result, SpamError};

/// How buckets are partitioned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// One bucket shared by every operation
    #[default]
    Global,
    /// A separate bucket per operation name
    PerOperation,
}

/// Nanoseconds in a minute; one token is this many units
const UNITS_PER_TOKEN: u128 = 60_000_000_000;

/// Clock reads are truncated to whole nanoseconds
const SLACK_NANOS: u128 = 1_000;

/// Token bucket state
///
/// Tokens are counted in integer units so that waiting exactly one refill
/// interval always yields a whole token, whatever the rate.
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current fill, in units
    units: u128,
    /// Maximum fill (burst size), in units
    capacity: u128,
    /// Units added per elapsed nanosecond
    per_minute: u128,
    /// Last refill time
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, per_minute: u32) -> Self {
        let capacity = capacity as u128 * UNITS_PER_TOKEN;
        Self {
            units: capacity,
            capacity,
            per_minute: per_minute as u128,
            last_refill: Instant::now(),
        }
    }

    /// Try to consume a token
    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.units + SLACK_NANOS * self.per_minute >= UNITS_PER_TOKEN {
            self.units = self.units.saturating_sub(UNITS_PER_TOKEN);
            true
        } else {
            false
        }
    }

    /// Refill tokens based on elapsed time
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_nanos();

        self.units = (self.units + elapsed * self.per_minute).min(self.capacity);
        self.last_refill = now;
    }

    fn tokens(&self) -> f64 {
        self.units as f64 / UNITS_PER_TOKEN as f64
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
enum LimitKey {
    Global,
    Operation(String),
}

/// Shared rate limiter
pub struct RateLimiter {
    buckets: Mutex<HashMap<LimitKey, TokenBucket>>,
    burst_size: u32,
    requests_per_minute: u32,
    scope: RateLimitScope,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            burst_size: config.burst_size,
            requests_per_minute: config.requests_per_minute,
            scope: config.scope,
        }
    }

    fn key(&self, operation: &str) -> LimitKey {
        match self.scope {
            RateLimitScope::Global => LimitKey::Global,
            RateLimitScope::PerOperation => LimitKey::Operation(operation.to_string()),
        }
    }

    /// Consume one token for `operation`, or fail with `RateLimitExceeded`
    pub async fn allow(&self, operation: &str) -> Result<()> {
        let key = self.key(operation);
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.burst_size, self.requests_per_minute));

        if bucket.try_consume() {
            Ok(())
        } else {
            warn!(
                "Rate limit exceeded for {} ({} per minute, burst {})",
                operation, self.requests_per_minute, self.burst_size
            );
            debug!("Tokens available: {:.3}", bucket.tokens());
            Err(SpamError::RateLimitExceeded)
        }
    }

    /// Tokens currently available to `operation`
    #[cfg(test)]
    pub(crate) async fn available(&self, operation: &str) -> f64 {
        let key = self.key(operation);
        let mut buckets = self.buckets.lock().await;

        match buckets.get_mut(&key) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens()
            }
            None => self.burst_size as f64,
        }
    }
}
