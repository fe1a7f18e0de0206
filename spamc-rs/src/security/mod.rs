//! Admission control and input checks applied before any daemon call

pub mod rate_limit;
pub mod reputation;
pub mod validator;

pub use rate_limit::{RateLimitScope, RateLimiter};
pub use reputation::{Reputation, ReputationChecker, ReputationVerdict};
pub use validator::{RequestValidator, ScanRequest};
