//! SPAMC/1.2 protocol client
//!
//! - [`codec`]: request framing and response decoding (no I/O)
//! - [`client`]: the [`SpamDaemon`] trait and its TCP implementation
//! - [`retry`]: optional retry decorator
//! - [`types`]: scan options, verdicts and config snapshots

pub mod client;
pub mod codec;
pub mod retry;
pub mod types;

pub use client::{SpamDaemon, SpamcClient};
pub use codec::ResponseGrammar;
pub use retry::RetryingDaemon;
pub use types::*;
