//! Provenance — append-only records of what tools did and why.
//!
//! The registry emits a pre-call and a post-call event for every valid
//! invocation. The agent loop adds one [`AuditRecord`] per tool call (after
//! retries) and one record per final response. Sinks live in
//! `countbot-security::audit`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;

/// Maximum characters of tool output kept in a `CallFinished` event.
pub const RESULT_PREVIEW_CHARS: usize = 1000;

/// One tool call as seen by the agent loop, including the user turn that led to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub call_id: String,
    pub session_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a provenance sink can be asked to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    /// A validated call is about to run
    CallStarted {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A call returned or raised
    CallFinished {
        call_id: String,
        tool_name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool call completed or permanently failed inside the agent loop
    ToolConversation(AuditRecord),

    /// The agent produced a final response for a user turn
    Response {
        session_id: String,
        user_message: String,
        response: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProvenanceEvent {
    /// Session the event belongs to, when known.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::CallStarted { session_id, .. } => session_id.as_deref(),
            Self::CallFinished { .. } => None,
            Self::ToolConversation(record) => Some(&record.session_id),
            Self::Response { session_id, .. } => Some(session_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallStarted { .. } => "call_started",
            Self::CallFinished { .. } => "call_finished",
            Self::ToolConversation(_) => "tool_conversation",
            Self::Response { .. } => "response",
        }
    }
}

/// Where provenance events are written.
///
/// Implementations must tolerate concurrent use from several agent loops.
/// Callers log a returned error and carry on.
pub trait ProvenanceSink: Send + Sync {
    fn record(&self, event: &ProvenanceEvent) -> Result<(), ProvenanceError>;
}

/// Truncate `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tagging() {
        let event = ProvenanceEvent::Response {
            session_id: "s1".into(),
            user_message: "hi".into(),
            response: "hello".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "response");
        assert_eq!(event.session_id(), Some("s1"));
        assert_eq!(event.kind(), "response");
    }

    #[test]
    fn tool_conversation_roundtrip() {
        let record = AuditRecord {
            call_id: "c1".into(),
            session_id: "s1".into(),
            tool_name: "echo".into(),
            arguments: serde_json::json!({"message": "hi"}),
            user_message: "say hi".into(),
            result: Some("Echo: hi".into()),
            error: None,
            duration_ms: 3,
            timestamp: Utc::now(),
        };
        let event = ProvenanceEvent::ToolConversation(record.clone());
        let line = serde_json::to_string(&event).unwrap();
        let back: ProvenanceEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
        assert!(record.succeeded());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
