//! Configuration for spamc-rs
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `SA_MCP_` (nested keys separated by
//! `__`, e.g. `SA_MCP_SPAMASSASSIN__HOST`).

use crate::error::{Result, SpamError};
use crate::security::rate_limit::RateLimitScope;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SA_MCP_CONFIG";

const ENV_PREFIX: &str = "SA_MCP";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const SYSTEM_CONFIG_FILE: &str = "/etc/spamassassin-mcp/config.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub spamassassin: SpamAssassinConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub transport: Transport,
}

/// How MCP clients reach the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// HTTP inside a container, stdio otherwise
    #[default]
    Auto,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// JSON-RPC over HTTP POST `/mcp`
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpamAssassinConfig {
    pub host: String,
    pub port: u16,
    /// Connect/read/write timeout in seconds
    pub timeout_secs: u64,
    /// Threshold reported by `get_config`
    pub threshold: f64,
    /// Upper bound on the bytes read back from spamd
    pub max_response_size: usize,
    pub retry: RetryConfig,
}

/// Retry policy for the optional retry decorator (0 retries = disabled)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub max_email_size: usize,
    pub rate_limiting: RateLimitConfig,
    pub allowed_senders: Vec<String>,
    pub blocked_domains: Vec<String>,
    /// Deadline for a whole daemon dispatch, in seconds
    pub scan_timeout_secs: u64,
    pub validation_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
    pub scope: RateLimitScope,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            transport: Transport::Auto,
        }
    }
}

impl Default for SpamAssassinConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 783,
            timeout_secs: 30,
            threshold: 5.0,
            max_response_size: 1024 * 1024,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_email_size: 10 * 1024 * 1024, // 10MB
            rate_limiting: RateLimitConfig::default(),
            allowed_senders: Vec::new(),
            blocked_domains: Vec::new(),
            scan_timeout_secs: 60,
            validation_enabled: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_size: 10,
            scope: RateLimitScope::Global,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl SpamAssassinConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServerConfig {
    /// Whether to serve over stdio rather than HTTP
    pub fn serves_stdio(&self) -> bool {
        match self.transport {
            Transport::Stdio => true,
            Transport::Http => false,
            Transport::Auto => !running_in_container(),
        }
    }
}

fn running_in_container() -> bool {
    Path::new("/.dockerenv").exists()
        || ["CONTAINER", "DOCKER_CONTAINER"]
            .iter()
            .any(|var| std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false))
}

impl SecurityConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, without environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SpamError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| SpamError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then the config file (if any), then `SA_MCP_*` overrides
    ///
    /// The file is `$SA_MCP_CONFIG` when set, otherwise the first of
    /// `./config.toml` and `/etc/spamassassin-mcp/config.toml` that exists.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let candidates = [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(SYSTEM_CONFIG_FILE)];
                first_existing(&candidates).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
            }
        };
        Self::load_from(&path)
    }

    /// Layered load with an explicit (optional) config file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())
            .map_err(|e| SpamError::Config(e.to_string()))?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("security.allowed_senders")
                    .with_list_parse_key("security.blocked_domains"),
            )
            .build()
            .map_err(|e| SpamError::Config(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| SpamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would disable a safety bound
    pub fn validate(&self) -> Result<()> {
        if self.spamassassin.host.trim().is_empty() {
            return Err(SpamError::Config("spamassassin.host is empty".to_string()));
        }
        if self.spamassassin.timeout_secs == 0 {
            return Err(SpamError::Config("spamassassin.timeout_secs must be > 0".to_string()));
        }
        if self.spamassassin.max_response_size == 0 {
            return Err(SpamError::Config(
                "spamassassin.max_response_size must be > 0".to_string(),
            ));
        }
        if self.security.max_email_size == 0 {
            return Err(SpamError::Config("security.max_email_size must be > 0".to_string()));
        }
        if self.security.scan_timeout_secs == 0 {
            return Err(SpamError::Config("security.scan_timeout_secs must be > 0".to_string()));
        }
        let rate = &self.security.rate_limiting;
        if rate.requests_per_minute == 0 || rate.burst_size == 0 {
            return Err(SpamError::Config(
                "rate_limiting requires requests_per_minute and burst_size > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.is_file()).cloned()
}
