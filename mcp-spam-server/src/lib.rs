//! mcp-spam-server - MCP Server for spamc-rs
//!
//! Exposes the spamc-rs tool operations via the Model Context Protocol
//! (JSON-RPC 2.0 over HTTP POST `/mcp`, or newline-delimited on stdio).

pub mod catalog;
pub mod rpc;
pub mod stdio;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use spamc_rs::tools::ToolHandler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::debug;

use rpc::{McpError, McpRequest, McpResponse, ToolCallParams};

/// Name reported in `initialize` and `/health`
pub const SERVER_NAME: &str = "spamassassin-mcp";
/// MCP protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Application state
pub struct AppState {
    pub tools: ToolHandler,
    /// Cancelled on shutdown; every call runs under a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(tools: ToolHandler, shutdown: CancellationToken) -> Self {
        Self { tools, shutdown }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/mcp", post(mcp_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// MCP endpoint handler
async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpRequest>,
) -> Json<McpResponse> {
    Json(handle_request(&state, request).await)
}

/// Dispatch one JSON-RPC request, whatever transport it came from
pub async fn handle_request(state: &AppState, request: McpRequest) -> McpResponse {
    debug!("📥 MCP request: method={}", request.method);

    if request.jsonrpc != rpc::JSONRPC_VERSION {
        return McpResponse::error(
            McpError::invalid_request(format!("Unsupported jsonrpc version: {}", request.jsonrpc)),
            request.id,
        );
    }

    let id = request.id.clone();
    let notification = request.is_notification();
    let outcome = match request.method.as_str() {
        "initialize" => Ok(handle_initialize()),
        "tools/list" => Ok(handle_tools_list()),
        "tools/call" => handle_tools_call(state, request.params).await,
        _ if notification => Ok(serde_json::Value::Null),
        method => Err(McpError::method_not_found(format!("Method not found: {}", method))),
    };

    match outcome {
        Ok(result) => McpResponse::success(result, id),
        Err(error) => McpResponse::error(error, id),
    }
}

fn handle_initialize() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_tools_list() -> serde_json::Value {
    debug!("📋 Listing available tools");

    let tools: Vec<serde_json::Value> = catalog::tools().iter().map(|tool| tool.to_schema()).collect();
    serde_json::json!({ "tools": tools })
}

async fn handle_tools_call(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, McpError> {
    let ToolCallParams { name, arguments } = serde_json::from_value(params)
        .map_err(|_| McpError::invalid_params("Expected {name, arguments}".to_string()))?;
    let arguments = if arguments.is_null() {
        serde_json::json!({})
    } else {
        arguments
    };

    debug!("🔧 Calling tool: {}", name);

    // Dropped with the request if the client goes away
    let cancel = state.shutdown.child_token();
    let tools = &state.tools;

    let value = match name.as_str() {
        "scan_email" => output(tools.scan_email(arguments_for(&name, arguments)?, &cancel).await)?,
        "check_reputation" => output(tools.check_reputation(arguments_for(&name, arguments)?).await)?,
        "explain_score" => output(tools.explain_score(arguments_for(&name, arguments)?, &cancel).await)?,
        "get_config" => output(tools.get_config(&cancel).await)?,
        "update_rules" => output(tools.update_rules(arguments_for(&name, arguments)?, &cancel).await)?,
        "test_rules" => output(tools.test_rules(arguments_for(&name, arguments)?, &cancel).await)?,
        _ => return Err(McpError::method_not_found(format!("Tool not found: {}", name))),
    };

    Ok(serde_json::json!({
        "content": [{ "type": "text", "text": value.to_string() }],
        "structuredContent": value,
        "isError": false
    }))
}

/// Decode tool arguments; messages never echo argument values
fn arguments_for<T: DeserializeOwned>(tool: &str, arguments: serde_json::Value) -> Result<T, McpError> {
    serde_json::from_value(arguments).map_err(|e| {
        let detail = e.to_string();
        let message = if detail.starts_with("missing field") || detail.starts_with("unknown variant") {
            format!("Invalid arguments for {}: {}", tool, detail)
        } else {
            format!("Invalid arguments for {}", tool)
        };
        McpError::invalid_params(message)
    })
}

fn output<T: Serialize>(result: spamc_rs::Result<T>) -> Result<serde_json::Value, McpError> {
    let value = result.map_err(|e| McpError::from(&e))?;
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string()))
}
