//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! execute shell commands, read/write files, fetch web pages, etc.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::ParameterSchema;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of one tool call as seen by the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output text, or the error text on failure
    pub output: String,

    /// Wall-clock time spent across all attempts
    pub duration_ms: u64,
}

/// Session and channel identity pushed to tools that care about it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContext {
    pub session_id: Option<String>,
    pub channel: Option<String>,
}

/// Why a registry call did not produce tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    NotFound,
    InvalidArguments,
    ExecutionFailed,
}

/// Result of the registry's non-raising calling convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Ok(String),
    Error { kind: ToolErrorKind, message: String },
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn kind(&self) -> Option<ToolErrorKind> {
        match self {
            Self::Ok(_) => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }

    /// The text handed back to the model.
    pub fn render(&self) -> String {
        match self {
            Self::Ok(text) => text.clone(),
            Self::Error { message, .. } => message.clone(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Ok(text) => text,
            Self::Error { message, .. } => message,
        }
    }
}

impl std::fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok(text) => f.write_str(text),
            Self::Error { message, .. } => f.write_str(message),
        }
    }
}

/// The core Tool trait.
///
/// Each tool (exec, read_file, write_file, web_fetch, etc.) implements this
/// trait. Tools are registered in the `ToolRegistry` and made available to
/// the agent loop.
///
/// Returning `Err` means the tool itself broke (I/O failure, spawn failure).
/// Problems the model caused, like a path outside the workspace, are returned
/// as `Ok` text starting with `Error:` so the model can correct itself.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "exec", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Schema describing this tool's parameters.
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    /// Receive the current session/channel identity. Most tools ignore it.
    fn set_context(&self, _context: &ToolContext) {}

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UpperTool;

    #[async_trait]
    impl Tool for UpperTool {
        fn name(&self) -> &str { "upper" }
        fn description(&self) -> &str { "Uppercases text" }
        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::object().required_property("text", ParameterSchema::string())
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").to_uppercase())
        }
    }

    #[test]
    fn definition_carries_schema() {
        let def = UpperTool.to_definition();
        assert_eq!(def.name, "upper");
        assert_eq!(def.parameters.required, vec!["text"]);
    }

    #[tokio::test]
    async fn execute_returns_text() {
        let out = UpperTool.execute(serde_json::json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "HI");
    }

    #[test]
    fn outcome_rendering() {
        let ok = ToolOutcome::Ok("done".into());
        assert!(ok.is_ok());
        assert_eq!(ok.render(), "done");

        let err = ToolOutcome::Error {
            kind: ToolErrorKind::NotFound,
            message: "Error: Tool 'x' not found".into(),
        };
        assert_eq!(err.kind(), Some(ToolErrorKind::NotFound));
        assert_eq!(err.to_string(), "Error: Tool 'x' not found");
    }
}
