//! Tool registry and dispatch
//!
//! Each service module declares its tools (name, description, JSON schema,
//! annotations) and a `call` function that maps a tool invocation onto the
//! matching Google API request.

pub mod calendar;
pub mod drive;
pub mod gmail;
pub mod tasks;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use gworkspace_google::{CalendarApi, DriveApi, GmailApi, GoogleClient, GoogleError, Service, TasksApi};
use gworkspace_protocol::{McpTool, ToolsCallResponse, ToolsListResponse};

/// Failures surfaced as JSON-RPC errors rather than tool results.
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Why a single tool invocation did not succeed.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// Arguments did not match the tool's schema.
    #[error("{0}")]
    BadArguments(String),
    /// Arguments decoded but failed validation.
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Google(#[from] GoogleError),
}

pub type ToolResult = Result<Value, ToolFailure>;

pub(crate) fn invalid(message: impl Into<String>) -> ToolFailure {
    ToolFailure::Invalid(message.into())
}

/// Reject blank strings with `message`.
pub(crate) fn require(value: &str, message: &str) -> Result<(), ToolFailure> {
    if value.trim().is_empty() {
        Err(invalid(message))
    } else {
        Ok(())
    }
}

/// `Some(trimmed)` for non-blank strings.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Decode tool arguments; a missing `arguments` object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolFailure> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|e| ToolFailure::BadArguments(e.to_string()))
}

pub(crate) fn not_found(message: impl Into<String>) -> Value {
    json!({"status": "not_found", "message": message.into()})
}

enum Backend {
    Drive(DriveApi),
    Gmail(GmailApi),
    Calendar(CalendarApi),
    Tasks(TasksApi),
}

pub struct ToolRegistry {
    service: Service,
    tools: Vec<McpTool>,
    backend: Backend,
}

impl ToolRegistry {
    /// Registry for `service` against the production Google endpoints
    pub fn new(service: Service, client: GoogleClient) -> Self {
        let backend = match service {
            Service::Drive => Backend::Drive(DriveApi::new(client)),
            Service::Gmail => Backend::Gmail(GmailApi::new(client)),
            Service::Calendar => Backend::Calendar(CalendarApi::new(client)),
            Service::Tasks => Backend::Tasks(TasksApi::new(client)),
        };
        Self::from_backend(service, backend)
    }

    /// Registry whose API calls go to `base_url`
    pub fn with_base_url(service: Service, client: GoogleClient, base_url: &str) -> Self {
        let backend = match service {
            Service::Drive => Backend::Drive(DriveApi::with_base_url(client, base_url)),
            Service::Gmail => Backend::Gmail(GmailApi::with_base_url(client, base_url)),
            Service::Calendar => Backend::Calendar(CalendarApi::with_base_url(client, base_url)),
            Service::Tasks => Backend::Tasks(TasksApi::with_base_url(client, base_url)),
        };
        Self::from_backend(service, backend)
    }

    fn from_backend(service: Service, backend: Backend) -> Self {
        let tools = match service {
            Service::Drive => drive::tools(),
            Service::Gmail => gmail::tools(),
            Service::Calendar => calendar::tools(),
            Service::Tasks => tasks::tools(),
        };
        Self { service, tools, backend }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    pub fn list_response(&self) -> ToolsListResponse {
        ToolsListResponse {
            tools: self.tools.clone(),
            next_cursor: None,
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResponse, ToolCallError> {
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(ToolCallError::UnknownTool(name.to_string()));
        }

        info!("Calling tool {}", name);
        let outcome = match &self.backend {
            Backend::Drive(api) => drive::call(api, name, arguments).await,
            Backend::Gmail(api) => gmail::call(api, name, arguments).await,
            Backend::Calendar(api) => calendar::call(api, name, arguments).await,
            Backend::Tasks(api) => tasks::call(api, name, arguments).await,
        };

        match outcome {
            Ok(value) => Ok(ToolsCallResponse::json(&value, false)),
            Err(ToolFailure::BadArguments(msg)) => Err(ToolCallError::InvalidArguments(msg)),
            Err(ToolFailure::Invalid(message)) => {
                warn!("Tool {} rejected arguments: {}", name, message);
                Ok(error_result(&message))
            }
            Err(ToolFailure::Google(err)) => {
                warn!("Tool {} failed: {}", name, err);
                Ok(error_result(&self.service.describe_error(&err)))
            }
        }
    }
}

fn error_result(message: &str) -> ToolsCallResponse {
    ToolsCallResponse::json(&json!({"status": "error", "message": message}), true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use gworkspace_google::{GoogleClient, StaticToken};
    use serde_json::Value;

    /// Client whose requests carry a fixed bearer token.
    pub fn client() -> GoogleClient {
        GoogleClient::new(Arc::new(StaticToken::new("test-token"))).unwrap()
    }

    /// Parse the JSON text block of a tool result.
    pub fn result_json(resp: &gworkspace_protocol::ToolsCallResponse) -> Value {
        serde_json::from_str(&resp.content[0].text).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{client, result_json};
    use super::*;

    // Nothing listens on the discard port; calls that pass validation fail fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[test]
    fn test_tool_names_are_unique_and_annotated() {
        for service in Service::ALL {
            let registry = ToolRegistry::with_base_url(service, client(), UNREACHABLE);
            let mut names: Vec<&str> = registry.tools().iter().map(|t| t.name.as_str()).collect();
            let total = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate tool in {}", service);
            for tool in registry.tools() {
                assert!(tool.annotations.is_some(), "{} lacks annotations", tool.name);
                assert_eq!(tool.input_schema["type"], "object", "{} schema", tool.name);
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::with_base_url(Service::Drive, client(), UNREACHABLE);
        let err = registry.call_tool("send_message", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolCallError::UnknownTool(name) if name == "send_message"));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_invalid_arguments() {
        let registry = ToolRegistry::with_base_url(Service::Drive, client(), UNREACHABLE);
        let err = registry
            .call_tool("list_files", json!({"max_results": "three"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_missing_arguments_treated_as_empty_object() {
        let registry = ToolRegistry::with_base_url(Service::Tasks, client(), UNREACHABLE);
        // list_tasklists has only optional arguments; the unreachable
        // endpoint turns into an error result rather than a protocol error.
        let resp = registry.call_tool("list_tasklists", Value::Null).await.unwrap();
        assert!(resp.is_error);
        assert_eq!(result_json(&resp)["status"], "error");
    }

    #[tokio::test]
    async fn test_google_errors_use_service_messages() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/users/@me/lists/missing")
            .with_status(404)
            .with_body(r#"{"error": {"code": 404, "message": "Not Found"}}"#)
            .create_async()
            .await;

        let registry = ToolRegistry::with_base_url(Service::Tasks, client(), &server.url());
        let resp = registry
            .call_tool("get_tasklist", json!({"tasklist_id": "missing"}))
            .await
            .unwrap();
        assert!(resp.is_error);
        let body = result_json(&resp);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("task or tasklist"));
    }
}
