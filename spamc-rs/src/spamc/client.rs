//! spamd client
//!
//! Every call opens its own TCP connection and drops it on return, so a
//! failed or cancelled call never leaves a socket behind.
//!
//! # Example
//! ```no_run
//! use spamc_rs::config::SpamAssassinConfig;
//! use spamc_rs::spamc::{SpamDaemon, SpamcClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SpamcClient::new(&SpamAssassinConfig::default())?;
//! client.ping().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::codec::{self, ResponseGrammar};
use super::types::{Command, ConfigSnapshot, RuleUpdateRequest, ScanResult};
use crate::config::SpamAssassinConfig;
use crate::error::{Result, SpamError};
use crate::security::validator::ScanRequest;

/// Version reported by `fetch_config`; not queried from the daemon
const ASSUMED_VERSION: &str = "3.4.x";
/// Approximate rule count reported by `fetch_config`
const APPROXIMATE_RULE_COUNT: u32 = 1000;

/// Operations offered by a content-analysis daemon
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpamDaemon: Send + Sync {
    /// Fail fast if the daemon does not answer PING with PONG
    async fn ping(&self) -> Result<()>;

    /// Submit validated content and decode the verdict
    async fn scan(&self, request: &ScanRequest) -> Result<ScanResult>;

    /// Locally held settings plus static daemon facts
    async fn fetch_config(&self) -> Result<ConfigSnapshot>;

    /// Ask for a rule refresh; success means the request was accepted
    async fn trigger_rule_update(&self, request: &RuleUpdateRequest) -> Result<()>;
}

/// SPAMC/1.2 client over plain TCP
pub struct SpamcClient {
    host: String,
    port: u16,
    timeout: Duration,
    threshold: f64,
    max_response_size: usize,
    grammar: ResponseGrammar,
}

impl SpamcClient {
    /// Create a new client; no connection is made until the first call
    pub fn new(config: &SpamAssassinConfig) -> Result<Self> {
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout(),
            threshold: config.threshold,
            max_response_size: config.max_response_size,
            grammar: ResponseGrammar::new()?,
        })
    }

    /// Address used in logs; never included in returned errors
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> Result<TcpStream> {
        debug!("Connecting to spamd at {}", self.address());

        let stream = self
            .bounded("connect", TcpStream::connect((self.host.as_str(), self.port)))
            .await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Apply the client timeout to one transport step
    async fn bounded<T, F>(&self, stage: &'static str, step: F) -> Result<T>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match timeout(self.timeout, step).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SpamError::ConnectionFailed(format!("{} failed: {}", stage, e.kind()))),
            Err(_) => Err(SpamError::Timeout(stage)),
        }
    }

    async fn exchange_ping(&self) -> Result<String> {
        let mut stream = self.connect().await?;
        self.bounded("write", stream.write_all(&codec::encode_ping())).await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let read = self.bounded("read", reader.read_line(&mut line)).await?;
        if read == 0 {
            return Err(SpamError::ConnectionFailed("connection closed before PONG".to_string()));
        }
        Ok(line)
    }
}

#[async_trait]
impl SpamDaemon for SpamcClient {
    async fn ping(&self) -> Result<()> {
        match self.exchange_ping().await {
            Ok(line) if codec::is_pong(&line) => {
                debug!("PONG from {}", self.address());
                Ok(())
            }
            Ok(line) => {
                warn!("Unexpected PING reply from {}: {}", self.address(), line.trim());
                Err(SpamError::DaemonUnreachable("unexpected reply to PING".to_string()))
            }
            Err(e) => {
                warn!("PING to {} failed: {}", self.address(), e);
                Err(SpamError::DaemonUnreachable(e.to_string()))
            }
        }
    }

    async fn scan(&self, request: &ScanRequest) -> Result<ScanResult> {
        let options = request.options();
        let command = Command::for_scan(&options);
        let frame = codec::encode(command, request.content(), &options);

        let mut stream = self.connect().await?;
        debug!("> {} ({} bytes of content)", command, request.content().len());
        self.bounded("write", stream.write_all(&frame)).await?;

        // spamd closes the connection once the response is written
        let mut raw = Vec::new();
        let limit = self.max_response_size as u64;
        let mut reader = (&mut stream).take(limit + 1);
        self.bounded("read", reader.read_to_end(&mut raw)).await?;
        if raw.len() as u64 > limit {
            return Err(SpamError::MalformedResponse(format!(
                "response exceeds {} bytes",
                limit
            )));
        }
        debug!("< {} bytes", raw.len());

        codec::decode(&raw, options.verbose, &self.grammar)
    }

    async fn fetch_config(&self) -> Result<ConfigSnapshot> {
        let mut settings = HashMap::new();
        settings.insert("host".to_string(), serde_json::json!(self.host));
        settings.insert("port".to_string(), serde_json::json!(self.port));
        settings.insert(
            "timeout".to_string(),
            serde_json::json!(format!("{}s", self.timeout.as_secs())),
        );

        Ok(ConfigSnapshot {
            version: ASSUMED_VERSION.to_string(),
            threshold: self.threshold,
            bayes_enabled: true,
            rule_count: APPROXIMATE_RULE_COUNT,
            settings,
        })
    }

    async fn trigger_rule_update(&self, request: &RuleUpdateRequest) -> Result<()> {
        // The refresh itself is a privileged job outside this client; only
        // accept the request while the daemon is answering.
        self.ping().await?;
        info!(
            "Rule update requested (source: {}, force: {})",
            request.source.as_str(),
            request.force
        );
        Ok(())
    }
}
