//! spamc-rs: SPAMC/1.2 client and tool-call layer for SpamAssassin
//!
//! Submits email to a remote spamd over TCP and turns its textual verdict
//! into typed results, behind input validation and rate limiting.
//!
//! # Features
//!
//! - **Protocol**: byte-exact SPAMC/1.2 framing and response decoding
//! - **Client**: connection-per-call, every I/O step bounded by a timeout
//! - **Security**: size/structure validation, envelope-header stripping,
//!   token-bucket rate limiting, sender reputation lists
//! - **Tools**: scan, explain, reputation, config, rule update and rule test
//!   operations with typed parameters
//!
//! # Example
//!
//! ```no_run
//! use spamc_rs::config::Config;
//! use spamc_rs::spamc::SpamcClient;
//! use spamc_rs::tools::{ScanEmailParams, ToolHandler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let client = SpamcClient::new(&config.spamassassin)?;
//!     let tools = ToolHandler::new(Arc::new(client), &config.security)?;
//!
//!     let params = ScanEmailParams {
//!         content: "Subject: hello\r\n\r\nHi there".to_string(),
//!         headers: Default::default(),
//!         check_bayes: false,
//!         verbose: true,
//!     };
//!     let result = tools.scan_email(params, &CancellationToken::new()).await?;
//!     println!("score {} (spam: {})", result.score, result.is_spam);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`spamc`]: Protocol codec and daemon client
//! - [`security`]: Validation, rate limiting and reputation
//! - [`tools`]: Tool operations

pub mod config;
pub mod error;
pub mod security;
pub mod spamc;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorKind, Result, SpamError};
