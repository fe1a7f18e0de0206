//! Typed parameters and results for the tool operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::security::reputation::Reputation;
use crate::spamc::types::{RuleMatch, RuleSource};

/// Characters of each sample echoed back by `test_rules`
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct ScanEmailParams {
    /// Raw message, headers included
    pub content: String,
    /// Extra header fields prepended before analysis
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub check_bayes: bool,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanEmailResult {
    pub score: f64,
    pub threshold: f64,
    pub is_spam: bool,
    pub rules_hit: Vec<RuleMatch>,
    pub summary: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckReputationParams {
    pub sender: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReputationResult {
    pub sender: String,
    pub domain: String,
    pub ip: Option<String>,
    pub reputation: Reputation,
    pub blocked: bool,
    pub reasons: Vec<String>,
    /// `check_time` (RFC 3339) and `source`
    pub details: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainScoreParams {
    pub email_content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreExplanation {
    pub final_score: f64,
    pub rule_details: Vec<RuleMatch>,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRulesParams {
    /// Defaults to `official`
    #[serde(default)]
    pub source: Option<RuleSource>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRulesResult {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestRulesParams {
    /// Custom rule definitions
    pub rules: String,
    #[serde(default)]
    pub test_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleTestResult {
    /// First characters of the sample
    pub email: String,
    pub score: f64,
    pub is_spam: bool,
    pub rules_matched: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestRulesResult {
    pub results: Vec<RuleTestResult>,
    pub summary: String,
}

/// Truncate to `max_chars` characters, marking the cut with `...`
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
