//! Tool-call layer: the six operations exposed to MCP clients

pub mod handler;
pub mod types;

pub use handler::{render_explanation, ToolHandler};
pub use types::*;
