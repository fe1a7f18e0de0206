use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpamError {
    #[error("Email content cannot be empty")]
    EmptyContent,

    #[error("Email size {size} exceeds limit of {max} bytes")]
    ContentTooLarge { size: usize, max: usize },

    #[error("Invalid email format: {0}")]
    InvalidFormat(String),

    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Transport deadline elapsed; reported as a connection failure.
    #[error("Connection timed out during {0}")]
    Timeout(&'static str),

    #[error("Daemon unreachable: {0}")]
    DaemonUnreachable(String),

    #[error("Malformed daemon response: {0}")]
    MalformedResponse(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes surfaced to tool callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyContent,
    ContentTooLarge,
    InvalidFormat,
    InvalidAddressFormat,
    InvalidParams,
    RateLimitExceeded,
    ConnectionFailed,
    MalformedResponse,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Caller-side (4xx-equivalent) failures
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::EmptyContent
                | ErrorKind::ContentTooLarge
                | ErrorKind::InvalidFormat
                | ErrorKind::InvalidAddressFormat
                | ErrorKind::InvalidParams
        )
    }
}

impl SpamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpamError::EmptyContent => ErrorKind::EmptyContent,
            SpamError::ContentTooLarge { .. } => ErrorKind::ContentTooLarge,
            SpamError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            SpamError::InvalidAddressFormat(_) => ErrorKind::InvalidAddressFormat,
            SpamError::InvalidParams(_) => ErrorKind::InvalidParams,
            SpamError::RateLimitExceeded => ErrorKind::RateLimitExceeded,
            SpamError::ConnectionFailed(_)
            | SpamError::Timeout(_)
            | SpamError::DaemonUnreachable(_)
            | SpamError::Io(_) => ErrorKind::ConnectionFailed,
            SpamError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SpamError::Cancelled => ErrorKind::Cancelled,
            SpamError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether a retry decorator may try the call again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SpamError::ConnectionFailed(_) | SpamError::Timeout(_) | SpamError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SpamError>;
