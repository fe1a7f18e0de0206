//! SPAMC types and data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Protocol version sent on every request line
pub const PROTOCOL_VERSION: &str = "SPAMC/1.2";

/// Request commands understood by spamd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Terse verdict (status line only)
    Check,
    /// Verdict plus a rule breakdown in the body
    Report,
    /// Liveness probe
    Ping,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Check => "CHECK",
            Command::Report => "REPORT",
            Command::Ping => "PING",
        }
    }

    /// Command used for a scan with the given options
    pub fn for_scan(options: &ScanOptions) -> Self {
        if options.verbose {
            Command::Report
        } else {
            Command::Check
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scan flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Ask spamd to include Bayesian analysis
    pub check_bayes: bool,
    /// Request the rule breakdown (REPORT)
    pub verbose: bool,
}

/// A rule reported by the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Rule identifier
    pub name: String,
    /// Score contribution (may be negative)
    pub score: f64,
    /// Description
    pub description: String,
}

/// Verdict decoded from one daemon response
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub score: f64,
    pub threshold: f64,
    /// Rules in the order the daemon reported them
    pub rules_hit: Vec<RuleMatch>,
    /// Report body, only present for verbose scans
    pub summary: Option<String>,
    pub response_headers: HashMap<String, String>,
}

impl ScanResult {
    /// Spam classification, always `score >= threshold`
    pub fn is_spam(&self) -> bool {
        self.score >= self.threshold
    }
}

/// Best-effort configuration snapshot, not queried live from spamd
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub version: String,
    pub threshold: f64,
    pub bayes_enabled: bool,
    /// Approximate
    pub rule_count: u32,
    pub settings: HashMap<String, serde_json::Value>,
}

/// Where updated rule definitions should come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    #[default]
    Official,
    Custom,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSource::Official => "official",
            RuleSource::Custom => "custom",
        }
    }
}

/// Request to refresh rule definitions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleUpdateRequest {
    pub source: RuleSource,
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: f64, threshold: f64) -> ScanResult {
        ScanResult {
            score,
            threshold,
            rules_hit: Vec::new(),
            summary: None,
            response_headers: HashMap::new(),
        }
    }

    #[test]
    fn test_is_spam_boundary() {
        assert!(result(5.0, 5.0).is_spam());
        assert!(result(5.1, 5.0).is_spam());
        assert!(!result(4.99, 5.0).is_spam());
        assert!(!result(-1.0, 0.0).is_spam());
    }

    #[test]
    fn test_command_for_scan() {
        assert_eq!(Command::for_scan(&ScanOptions::default()), Command::Check);
        let verbose = ScanOptions { verbose: true, check_bayes: false };
        assert_eq!(Command::for_scan(&verbose), Command::Report);
        assert_eq!(Command::Ping.to_string(), "PING");
    }

    #[test]
    fn test_rule_source_serde() {
        let source: RuleSource = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(source, RuleSource::Custom);
        assert_eq!(RuleSource::default().as_str(), "official");
    }
}
