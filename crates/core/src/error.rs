//! Error types for the CountBot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all CountBot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    // --- Collaborator errors ---
    #[error("Provenance error: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

/// Failure raised from inside a tool's `execute`.
///
/// Only `ExecutionFailed` and `Timeout` are retried by the agent loop.
/// `NotFound` and `InvalidArguments` are rendered inline by the registry.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("{reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Shorthand for the common `ExecutionFailed` case.
    pub fn failed(tool_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("No assistant turn requested tool call '{0}'")]
    UnknownToolCall(String),
}

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("Failed to write provenance record: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to encode provenance record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Observer unavailable: {0}")]
    Unavailable(String),

    #[error("Observer rejected event: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),
}
