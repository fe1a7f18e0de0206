//! Tool operations
//!
//! Every operation follows the same per-call lifecycle:
//!
//! ```text
//! Received -> RateChecked -> Validated -> Dispatched -> Completed
//!                  \              \             \
//!                   +--------------+-------------+--> Failed
//! ```
//!
//! Rate-limit and validation failures never reach the daemon. Dispatch is
//! bounded by the scan timeout and by the caller's cancellation token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use std::collections::HashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::*;
use crate::config::SecurityConfig;
use crate::error::{Result, SpamError};
use crate::security::rate_limit::RateLimiter;
use crate::security::reputation::ReputationChecker;
use crate::security::validator::{self, RequestValidator};
use crate::spamc::client::SpamDaemon;
use crate::spamc::types::{ConfigSnapshot, RuleUpdateRequest, ScanOptions, ScanResult};

/// Value of `details.source` in reputation results
const REPUTATION_SOURCE: &str = "spamassassin-mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallState {
    Received,
    RateChecked,
    Validated,
    Dispatched,
    Completed,
    Failed,
}

/// Lifecycle tracker for one tool call
struct Call {
    id: Uuid,
    operation: &'static str,
    state: CallState,
    started: Instant,
}

impl Call {
    fn received(operation: &'static str) -> Self {
        let id = Uuid::new_v4();
        debug!("[{}] {} received", id, operation);
        Self {
            id,
            operation,
            state: CallState::Received,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: CallState) {
        if self.state != next {
            debug!("[{}] {} {:?} -> {:?}", self.id, self.operation, self.state, next);
            self.state = next;
        }
    }

    /// Move to the terminal state matching `result`
    fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        let elapsed = self.started.elapsed();
        match &result {
            Ok(_) => {
                self.advance(CallState::Completed);
                info!("[{}] {} completed in {:?}", self.id, self.operation, elapsed);
            }
            Err(e) => {
                let from = self.state;
                self.advance(CallState::Failed);
                warn!(
                    "[{}] {} failed after {:?} (from {:?}): {}",
                    self.id, self.operation, elapsed, from, e
                );
            }
        }
        result
    }
}

pub struct ToolHandler {
    daemon: Arc<dyn SpamDaemon>,
    limiter: RateLimiter,
    validator: RequestValidator,
    reputation: ReputationChecker,
    scan_timeout: Duration,
}

impl ToolHandler {
    pub fn new(daemon: Arc<dyn SpamDaemon>, security: &SecurityConfig) -> Result<Self> {
        Ok(Self {
            daemon,
            limiter: RateLimiter::new(&security.rate_limiting),
            validator: RequestValidator::from_config(security),
            reputation: ReputationChecker::from_config(security)?,
            scan_timeout: security.scan_timeout(),
        })
    }

    async fn admit(&self, call: &mut Call) -> Result<()> {
        self.limiter.allow(call.operation).await?;
        call.advance(CallState::RateChecked);
        Ok(())
    }

    /// Run one daemon interaction under the scan timeout and `cancel`
    async fn dispatch<T, F>(&self, call: &mut Call, cancel: &CancellationToken, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        call.advance(CallState::Dispatched);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SpamError::Cancelled),
            outcome = tokio::time::timeout(self.scan_timeout, step) => {
                outcome.map_err(|_| SpamError::Timeout("scan"))?
            }
        }
    }

    /// Scan a message and return the verdict
    pub async fn scan_email(
        &self,
        params: ScanEmailParams,
        cancel: &CancellationToken,
    ) -> Result<ScanEmailResult> {
        let mut call = Call::received("scan_email");
        let result = self.run_scan_email(&mut call, params, cancel).await;
        call.finish(result)
    }

    async fn run_scan_email(
        &self,
        call: &mut Call,
        params: ScanEmailParams,
        cancel: &CancellationToken,
    ) -> Result<ScanEmailResult> {
        self.admit(call).await?;

        let content = validator::prepend_headers(&params.content, &params.headers)?;
        let options = ScanOptions {
            check_bayes: params.check_bayes,
            verbose: params.verbose,
        };
        let request = self.validator.validate(&content, options)?;
        call.advance(CallState::Validated);

        info!(
            "[{}] Scanning {} bytes (bayes: {}, verbose: {})",
            call.id,
            request.len(),
            options.check_bayes,
            options.verbose
        );

        let verdict = self.dispatch(call, cancel, self.daemon.scan(&request)).await?;

        info!(
            "[{}] Score {:.2}/{:.2}, spam: {}, {} rules",
            call.id,
            verdict.score,
            verdict.threshold,
            verdict.is_spam(),
            verdict.rules_hit.len()
        );

        Ok(ScanEmailResult {
            score: verdict.score,
            threshold: verdict.threshold,
            is_spam: verdict.is_spam(),
            rules_hit: verdict.rules_hit,
            summary: verdict.summary,
            timestamp: Utc::now(),
        })
    }

    /// Evaluate a sender against the allow and block lists
    pub async fn check_reputation(&self, params: CheckReputationParams) -> Result<ReputationResult> {
        let mut call = Call::received("check_reputation");
        let result = self.run_check_reputation(&mut call, params).await;
        call.finish(result)
    }

    async fn run_check_reputation(
        &self,
        call: &mut Call,
        params: CheckReputationParams,
    ) -> Result<ReputationResult> {
        self.admit(call).await?;

        let domain = params.domain.as_deref().filter(|d| !d.is_empty());
        let ip = params.ip.filter(|ip| !ip.is_empty());
        let verdict = self
            .reputation
            .evaluate(&params.sender, domain, ip.as_deref())?;
        call.advance(CallState::Validated);

        info!(
            "[{}] Reputation {:?} (blocked: {})",
            call.id, verdict.reputation, verdict.blocked
        );

        let mut details = HashMap::new();
        details.insert("check_time".to_string(), Utc::now().to_rfc3339());
        details.insert("source".to_string(), REPUTATION_SOURCE.to_string());

        Ok(ReputationResult {
            sender: params.sender,
            domain: verdict.domain,
            ip,
            reputation: verdict.reputation,
            blocked: verdict.blocked,
            reasons: verdict.reasons,
            details,
        })
    }

    /// Verbose Bayes-enabled scan rendered as a readable breakdown
    pub async fn explain_score(
        &self,
        params: ExplainScoreParams,
        cancel: &CancellationToken,
    ) -> Result<ScoreExplanation> {
        let mut call = Call::received("explain_score");
        let result = self.run_explain_score(&mut call, params, cancel).await;
        call.finish(result)
    }

    async fn run_explain_score(
        &self,
        call: &mut Call,
        params: ExplainScoreParams,
        cancel: &CancellationToken,
    ) -> Result<ScoreExplanation> {
        self.admit(call).await?;

        let options = ScanOptions {
            check_bayes: true,
            verbose: true,
        };
        let request = self.validator.validate(&params.email_content, options)?;
        call.advance(CallState::Validated);

        let verdict = self.dispatch(call, cancel, self.daemon.scan(&request)).await?;
        let explanation = render_explanation(&verdict);

        Ok(ScoreExplanation {
            final_score: verdict.score,
            rule_details: verdict.rules_hit,
            explanation,
        })
    }

    /// Current daemon configuration snapshot
    pub async fn get_config(&self, cancel: &CancellationToken) -> Result<ConfigSnapshot> {
        let mut call = Call::received("get_config");
        let result = self.run_get_config(&mut call, cancel).await;
        call.finish(result)
    }

    async fn run_get_config(&self, call: &mut Call, cancel: &CancellationToken) -> Result<ConfigSnapshot> {
        self.admit(call).await?;
        call.advance(CallState::Validated);
        self.dispatch(call, cancel, self.daemon.fetch_config()).await
    }

    /// Request a rule refresh
    pub async fn update_rules(
        &self,
        params: UpdateRulesParams,
        cancel: &CancellationToken,
    ) -> Result<UpdateRulesResult> {
        let mut call = Call::received("update_rules");
        let result = self.run_update_rules(&mut call, params, cancel).await;
        call.finish(result)
    }

    async fn run_update_rules(
        &self,
        call: &mut Call,
        params: UpdateRulesParams,
        cancel: &CancellationToken,
    ) -> Result<UpdateRulesResult> {
        self.admit(call).await?;

        let request = RuleUpdateRequest {
            source: params.source.unwrap_or_default(),
            force: params.force,
        };
        call.advance(CallState::Validated);

        self.dispatch(call, cancel, self.daemon.trigger_rule_update(&request))
            .await?;

        Ok(UpdateRulesResult {
            status: "success".to_string(),
            message: format!("Rule update from {} source requested", request.source.as_str()),
            timestamp: Utc::now(),
        })
    }

    /// Scan sample messages; samples failing validation are skipped
    pub async fn test_rules(
        &self,
        params: TestRulesParams,
        cancel: &CancellationToken,
    ) -> Result<TestRulesResult> {
        let mut call = Call::received("test_rules");
        let result = self.run_test_rules(&mut call, params, cancel).await;
        call.finish(result)
    }

    async fn run_test_rules(
        &self,
        call: &mut Call,
        params: TestRulesParams,
        cancel: &CancellationToken,
    ) -> Result<TestRulesResult> {
        self.admit(call).await?;

        if params.rules.trim().is_empty() {
            return Err(SpamError::InvalidParams("rules cannot be empty".to_string()));
        }

        let options = ScanOptions {
            check_bayes: false,
            verbose: true,
        };
        let mut samples = Vec::with_capacity(params.test_emails.len());
        for (index, email) in params.test_emails.iter().enumerate() {
            match self.validator.validate(email, options) {
                Ok(request) => samples.push((email, request)),
                Err(e) => debug!("[{}] Skipping sample {}: {}", call.id, index, e),
            }
        }
        call.advance(CallState::Validated);

        info!(
            "[{}] Testing {} bytes of rules against {} of {} samples",
            call.id,
            params.rules.len(),
            samples.len(),
            params.test_emails.len()
        );

        let mut results = Vec::with_capacity(samples.len());
        for (email, request) in samples {
            let verdict = self.dispatch(call, cancel, self.daemon.scan(&request)).await?;
            results.push(RuleTestResult {
                email: preview(email, PREVIEW_CHARS),
                score: verdict.score,
                is_spam: verdict.is_spam(),
                rules_matched: verdict.rules_hit.into_iter().map(|rule| rule.name).collect(),
            });
        }

        Ok(TestRulesResult {
            summary: format!("Tested {} emails against custom rules", results.len()),
            results,
        })
    }
}

/// Human-readable score breakdown
pub fn render_explanation(result: &ScanResult) -> String {
    let mut explanation = format!(
        "Final Score: {:.2} (Threshold: {:.2})\nClassification: {}\n\n",
        result.score,
        result.threshold,
        if result.is_spam() { "SPAM" } else { "HAM" }
    );

    if result.rules_hit.is_empty() {
        explanation.push_str("No spam rules triggered.\n");
    } else {
        explanation.push_str("Rules Triggered:\n");
        for rule in &result.rules_hit {
            explanation.push_str(&format!(
                "{}: {:.2} - {}\n",
                rule.name, rule.score, rule.description
            ));
        }
    }

    explanation
}
