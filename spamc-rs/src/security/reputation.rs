//! Sender reputation from configured allow and block lists
//!
//! Block-list hits always win: a sender that is allow-listed but whose
//! domain matches a blocked entry is reported as [`Reputation::Bad`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::config::SecurityConfig;
use crate::error::{Result, SpamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reputation {
    Good,
    Bad,
    Unknown,
}

/// Outcome of a list evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct ReputationVerdict {
    /// Domain that was evaluated (given, or derived from the sender)
    pub domain: String,
    pub reputation: Reputation,
    pub blocked: bool,
    /// One entry per matching block-list entry, in list order
    pub reasons: Vec<String>,
}

pub struct ReputationChecker {
    email_pattern: Regex,
    ip_pattern: Regex,
    domain_pattern: Regex,
    allowed_senders: Vec<String>,
    blocked_domains: Vec<String>,
}

impl ReputationChecker {
    pub fn new(allowed_senders: Vec<String>, blocked_domains: Vec<String>) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| SpamError::Config(format!("invalid pattern: {}", e)))
        };

        Ok(Self {
            email_pattern: compile(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")?,
            ip_pattern: compile(r"^(\d{1,3}\.){3}\d{1,3}$")?,
            domain_pattern: compile(r"^([a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}$")?,
            allowed_senders,
            blocked_domains: blocked_domains
                .into_iter()
                .map(|entry| entry.trim().to_ascii_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        Self::new(config.allowed_senders.clone(), config.blocked_domains.clone())
    }

    fn check_sender(&self, sender: &str) -> Result<()> {
        if self.email_pattern.is_match(sender) {
            Ok(())
        } else {
            Err(SpamError::InvalidAddressFormat("invalid email address format".to_string()))
        }
    }

    fn check_ip(&self, ip: &str) -> Result<()> {
        // The pattern alone admits octets above 255
        if self.ip_pattern.is_match(ip) && ip.parse::<Ipv4Addr>().is_ok() {
            Ok(())
        } else {
            Err(SpamError::InvalidAddressFormat("invalid IP address format".to_string()))
        }
    }

    fn check_domain(&self, domain: &str) -> Result<()> {
        if self.domain_pattern.is_match(domain) {
            Ok(())
        } else {
            Err(SpamError::InvalidAddressFormat("invalid domain format".to_string()))
        }
    }

    /// Validate the inputs and evaluate the lists
    ///
    /// `domain` defaults to the part of `sender` after the `@`. An empty
    /// sender is accepted when `domain` is given.
    pub fn evaluate(
        &self,
        sender: &str,
        domain: Option<&str>,
        ip: Option<&str>,
    ) -> Result<ReputationVerdict> {
        if !sender.is_empty() {
            self.check_sender(sender)?;
        } else if domain.is_none() {
            return Err(SpamError::InvalidAddressFormat(
                "sender or domain is required".to_string(),
            ));
        }
        if let Some(ip) = ip {
            self.check_ip(ip)?;
        }

        let domain = match domain {
            Some(domain) => {
                self.check_domain(domain)?;
                domain.to_string()
            }
            None => sender
                .split_once('@')
                .map(|(_, domain)| domain.to_string())
                .unwrap_or_default(),
        };

        let lowered = domain.to_ascii_lowercase();
        let reasons: Vec<String> = self
            .blocked_domains
            .iter()
            .filter(|entry| lowered.contains(entry.as_str()))
            .map(|entry| format!("Domain {} is blocked", entry))
            .collect();
        let blocked = !reasons.is_empty();

        let reputation = if blocked {
            Reputation::Bad
        } else if self.allowed_senders.iter().any(|allowed| allowed == sender) {
            Reputation::Good
        } else {
            Reputation::Unknown
        };

        debug!("Reputation for domain {}: {:?}", domain, reputation);

        Ok(ReputationVerdict {
            domain,
            reputation,
            blocked,
            reasons,
        })
    }
}
