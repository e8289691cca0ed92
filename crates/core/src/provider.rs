//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a transcript to an LLM and stream the
//! response back as content deltas, tool-call fragments and reasoning.
//!
//! No concrete backend lives in this workspace; embedders implement the trait
//! for whatever API they talk to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;
use crate::schema::ParameterSchema;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// The transcript so far
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// Schema describing the tool's parameters
    pub parameters: ParameterSchema,
}

/// A piece of a tool call, as streamed by the model.
///
/// The first fragment for an id usually carries the name; later fragments
/// carry more argument text. The call is complete once the stream finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Argument JSON text delta
    #[serde(default)]
    pub arguments: String,
}

/// A single chunk in a streaming response.
///
/// Stream-level failures travel as `Err(ProviderError)` on the same channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Visible text delta
    Content(String),

    /// Partial tool call
    ToolCall(ToolCallFragment),

    /// Reasoning trace delta (never shown to the caller)
    Reasoning(String),

    /// The model finished; carries the finish reason
    Finish(String),
}

/// Receiver side of a provider stream.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The agent loop calls `stream()`
/// without knowing which provider is being used.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter", "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response chunks.
    ///
    /// An `Err` here, or an `Err` item on the channel, is a stream error and
    /// ends the whole agent call.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "exec".into(),
            description: "Execute a shell command".into(),
            parameters: ParameterSchema::object().required_property(
                "command",
                ParameterSchema::string().describe("The command to run"),
            ),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["name"], "exec");
        assert_eq!(json["parameters"]["properties"]["command"]["type"], "string");
        assert_eq!(json["parameters"]["required"][0], "command");
    }

    #[test]
    fn stream_chunk_serialization() {
        let chunk = StreamChunk::ToolCall(ToolCallFragment {
            id: "call_1".into(),
            name: Some("echo".into()),
            arguments: "{\"mess".into(),
        });
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "tool_call");
        assert_eq!(json["data"]["id"], "call_1");

        let back: StreamChunk = serde_json::from_value(json).unwrap();
        assert_eq!(back, chunk);
    }
}
