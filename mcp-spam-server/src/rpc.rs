//! MCP JSON-RPC envelope types

use serde::{Deserialize, Serialize};
use spamc_rs::{ErrorKind, SpamError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Server-defined code: admission denied by the rate limiter
pub const RATE_LIMITED: i32 = -32029;
/// Server-defined code: spamd failed or answered with something unusable
pub const DAEMON_ERROR: i32 = -32002;
/// Call cancelled before completion (LSP convention)
pub const REQUEST_CANCELLED: i32 = -32800;

/// MCP JSON-RPC request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Number or string; echoed back unchanged
    #[serde(default)]
    pub id: serde_json::Value,
}

impl McpRequest {
    /// Notifications expect no response
    pub fn is_notification(&self) -> bool {
        self.method.starts_with("notifications/")
    }
}

/// Parameters of `tools/call`
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// MCP JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
    pub id: serde_json::Value,
}

impl McpResponse {
    /// Create a successful response
    pub fn success(result: serde_json::Value, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(error: McpError, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// MCP error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpError {
    fn new(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(-32700, message)
    }

    pub fn invalid_request(message: String) -> Self {
        Self::new(-32600, message)
    }

    pub fn method_not_found(message: String) -> Self {
        Self::new(-32601, message)
    }

    pub fn invalid_params(message: String) -> Self {
        Self::new(-32602, message)
    }

    pub fn internal_error(message: String) -> Self {
        Self::new(-32603, message)
    }
}

impl From<&SpamError> for McpError {
    fn from(error: &SpamError) -> Self {
        let kind = error.kind();
        let code = match kind {
            kind if kind.is_client_error() => -32602,
            ErrorKind::RateLimitExceeded => RATE_LIMITED,
            ErrorKind::ConnectionFailed | ErrorKind::MalformedResponse => DAEMON_ERROR,
            ErrorKind::Cancelled => REQUEST_CANCELLED,
            _ => -32603,
        };

        Self {
            code,
            message: error.to_string(),
            data: Some(serde_json::json!({ "kind": kind })),
        }
    }
}
