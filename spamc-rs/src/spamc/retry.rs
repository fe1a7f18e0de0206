//! Retry decorator for [`SpamDaemon`] implementations
//!
//! Only `scan` is retried, and only on transport failures (see
//! [`crate::error::SpamError::is_transient`]), with exponential backoff capped at
//! `max_delay`. Malformed responses pass straight through.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::client::SpamDaemon;
use super::types::{ConfigSnapshot, RuleUpdateRequest, ScanResult};
use crate::config::RetryConfig;
use crate::error::Result;
use crate::security::validator::ScanRequest;

/// Wraps a daemon client with bounded retries
pub struct RetryingDaemon<D> {
    inner: D,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl<D: SpamDaemon> RetryingDaemon<D> {
    pub fn new(inner: D, config: &RetryConfig) -> Self {
        Self {
            inner,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        operation, e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<D: SpamDaemon> SpamDaemon for RetryingDaemon<D> {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn scan(&self, request: &ScanRequest) -> Result<ScanResult> {
        self.with_retry("scan", || self.inner.scan(request)).await
    }

    async fn fetch_config(&self) -> Result<ConfigSnapshot> {
        self.inner.fetch_config().await
    }

    async fn trigger_rule_update(&self, request: &RuleUpdateRequest) -> Result<()> {
        self.inner.trigger_rule_update(request).await
    }
}
