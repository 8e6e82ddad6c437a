//! Newline-delimited JSON-RPC loop over stdio
//!
//! One request per line, answered in order. Notifications get no reply.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use gworkspace_protocol::{
    error, success, ErrorCode, InitializeRequest, JsonRpcRequest, JsonRpcResponse, ToolsCallRequest,
};

use crate::initialize;
use crate::tools::{ToolCallError, ToolRegistry};

pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve until the reader reaches EOF.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Serving {} tools on stdio", self.registry.service());
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                info!("Input closed, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(trimmed).await {
                writer.write_all(serde_json::to_string(&response)?.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Response for one input line, or `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparseable input line: {}", e);
                return Some(error(Value::Null, ErrorCode::ParseError, format!("parse error: {}", e), None));
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(req) => req,
            Err(e) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                return Some(error(id, ErrorCode::InvalidRequest, format!("invalid request: {}", e), None));
            }
        };

        if request.is_notification() {
            debug!("Notification {}", request.method);
            return None;
        }
        let id = request.id.clone().unwrap_or_default();

        if request.jsonrpc != "2.0" {
            return Some(error(
                id,
                ErrorCode::InvalidRequest,
                format!("unsupported jsonrpc version: {}", request.jsonrpc),
                None,
            ));
        }

        Some(self.dispatch(id, request).await)
    }

    async fn dispatch(&self, id: Value, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => match serde_json::from_value::<InitializeRequest>(request.params) {
                Ok(init) => to_success(id, &initialize::handle_initialize(self.registry.service(), &init)),
                Err(e) => error(id, ErrorCode::InvalidParams, format!("invalid initialize params: {}", e), None),
            },
            "ping" => success(id, json!({})),
            "tools/list" => to_success(id, &self.registry.list_response()),
            "tools/call" => match serde_json::from_value::<ToolsCallRequest>(request.params) {
                Ok(call) => match self.registry.call_tool(&call.name, call.arguments).await {
                    Ok(result) => to_success(id, &result),
                    Err(ToolCallError::UnknownTool(name)) => {
                        error(id, ErrorCode::MethodNotFound, format!("unknown tool: {}", name), None)
                    }
                    Err(ToolCallError::InvalidArguments(msg)) => {
                        error(id, ErrorCode::InvalidParams, format!("invalid arguments: {}", msg), None)
                    }
                },
                Err(e) => error(id, ErrorCode::InvalidParams, format!("invalid tools/call params: {}", e), None),
            },
            _ => error(id, ErrorCode::MethodNotFound, format!("method not found: {}", request.method), None),
        }
    }
}

fn to_success<T: serde::Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => success(id, value),
        Err(e) => error(id, ErrorCode::InternalError, format!("failed to encode result: {}", e), None),
    }
}
