//! Newline-delimited JSON-RPC on stdin/stdout
//!
//! One request per line, one response per line. Notifications get no
//! reply. Logs must go to stderr while this transport runs.

use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::rpc::{McpError, McpRequest, McpResponse};
use crate::{handle_request, AppState};

/// Serve requests from `input` until EOF or shutdown
pub async fn serve<R, W>(state: Arc<AppState>, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match decode(line) {
            Ok(request) if request.is_notification() => {
                debug!("Notification: {}", request.method);
                continue;
            }
            Ok(request) => handle_request(&state, request).await,
            Err(error) => McpResponse::error(error, serde_json::Value::Null),
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        output.write_all(&encoded).await?;
        output.flush().await?;
    }

    info!("stdio transport closed");
    Ok(())
}

fn decode(line: &str) -> Result<McpRequest, McpError> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|_| {
        warn!("Discarding line that is not JSON ({} bytes)", line.len());
        McpError::parse_error("Parse error".to_string())
    })?;
    serde_json::from_value(value)
        .map_err(|_| McpError::invalid_request("Expected a JSON-RPC request".to_string()))
}
