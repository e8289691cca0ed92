//! Assembles one streamed model turn from its chunks.

use countbot_core::provider::ToolCallFragment;
use countbot_core::tool::ToolCall;
use serde_json::Value;

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates content, reasoning and tool-call fragments for one turn.
///
/// Tool calls keep the order in which their ids first appeared.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    content: String,
    reasoning: String,
    calls: Vec<PendingCall>,
    finish_reason: Option<String>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_content(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub fn push_reasoning(&mut self, delta: &str) {
        self.reasoning.push_str(delta);
    }

    /// Merge a fragment into the call with the same id.
    ///
    /// A fragment without an id continues the most recent call.
    pub fn push_fragment(&mut self, fragment: ToolCallFragment) {
        let index = if fragment.id.is_empty() {
            self.calls.len().checked_sub(1)
        } else {
            self.calls.iter().position(|c| c.id == fragment.id)
        };

        let call = match index {
            Some(i) => &mut self.calls[i],
            None => {
                self.calls.push(PendingCall {
                    id: fragment.id.clone(),
                    ..PendingCall::default()
                });
                let last = self.calls.len() - 1;
                &mut self.calls[last]
            }
        };

        if let Some(name) = fragment.name.filter(|n| !n.is_empty())
            && call.name.is_empty()
        {
            call.name = name;
        }
        call.arguments.push_str(&fragment.arguments);
    }

    pub fn finish(&mut self, reason: impl Into<String>) {
        self.finish_reason = Some(reason.into());
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Content, reasoning (if any) and the completed tool calls.
    pub fn into_parts(self) -> (String, Option<String>, Vec<ToolCall>) {
        let reasoning = (!self.reasoning.is_empty()).then_some(self.reasoning);
        let calls = self
            .calls
            .into_iter()
            .map(|c| ToolCall {
                arguments: parse_arguments(&c.arguments),
                id: c.id,
                name: c.name,
            })
            .collect();
        (self.content, reasoning, calls)
    }
}

/// Parse streamed argument text.
///
/// Empty text is an empty object. Text that is not JSON is kept as a string
/// so schema validation reports it back to the model.
pub fn parse_arguments(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}
