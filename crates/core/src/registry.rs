//! Tool registry — owns the registered capabilities and dispatches calls.
//!
//! Two calling conventions:
//! - [`ToolRegistry::execute`] never fails. Unknown tools, bad arguments and
//!   tool failures all come back as a [`ToolOutcome`] whose text the model can read.
//! - [`ToolRegistry::execute_raising`] lets the tool's own [`ToolError`] escape
//!   so the agent loop can count and retry failed attempts.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RegistryError, ToolError};
use crate::provenance::{ProvenanceEvent, ProvenanceSink, RESULT_PREVIEW_CHARS, truncate_chars};
use crate::provider::ToolDefinition;
use crate::tool::{Tool, ToolContext, ToolErrorKind, ToolOutcome};

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
    context: RwLock<ToolContext>,
    provenance: Option<Arc<dyn ProvenanceSink>>,
    provenance_enabled: bool,
}

/// Either inline text for the model, or a failure from inside the tool.
enum Dispatch {
    Inline(ToolOutcome),
    Ran(Result<String, ToolError>),
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            context: RwLock::new(ToolContext::default()),
            provenance: None,
            provenance_enabled: true,
        }
    }

    /// Attach a provenance sink for pre/post call events.
    pub fn with_provenance(mut self, sink: Arc<dyn ProvenanceSink>) -> Self {
        self.provenance = Some(sink);
        self
    }

    /// Turn registry-level provenance events on or off.
    pub fn set_provenance_enabled(&mut self, enabled: bool) {
        self.provenance_enabled = enabled;
    }

    /// Register a tool. Fails, leaving the registry untouched, if the name is taken.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tool.set_context(&self.context());
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Remove a tool. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        let removed = self.tools.remove(name).is_some();
        if removed {
            debug!(tool = %name, "Unregistered tool");
        }
        removed
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the LLM), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    /// Current session/channel identity.
    pub fn context(&self) -> ToolContext {
        self.context.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Set the session identity and push it to every tool.
    pub fn set_session(&self, session_id: impl Into<String>) {
        let snapshot = {
            let mut ctx = self.context.write().unwrap_or_else(|e| e.into_inner());
            ctx.session_id = Some(session_id.into());
            ctx.clone()
        };
        self.propagate(&snapshot);
    }

    /// Set the channel identity and push it to every tool.
    pub fn set_channel(&self, channel: impl Into<String>) {
        let snapshot = {
            let mut ctx = self.context.write().unwrap_or_else(|e| e.into_inner());
            ctx.channel = Some(channel.into());
            ctx.clone()
        };
        self.propagate(&snapshot);
    }

    fn propagate(&self, context: &ToolContext) {
        for tool in self.tools.values() {
            tool.set_context(context);
        }
    }

    /// Execute a tool by name. Never fails; every problem becomes inline text.
    pub async fn execute(&self, name: &str, arguments: serde_json::Value) -> ToolOutcome {
        match self.dispatch(name, arguments).await {
            Dispatch::Inline(outcome) => outcome,
            Dispatch::Ran(Ok(text)) => ToolOutcome::Ok(text),
            Dispatch::Ran(Err(e)) => ToolOutcome::Error {
                kind: ToolErrorKind::ExecutionFailed,
                message: format!("Error executing {name}: {e}"),
            },
        }
    }

    /// Execute a tool by name, letting execution failures escape.
    ///
    /// Unknown tools and invalid arguments still come back as `Ok` text:
    /// retrying them cannot help.
    pub async fn execute_raising(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        match self.dispatch(name, arguments).await {
            Dispatch::Inline(outcome) => Ok(outcome.into_text()),
            Dispatch::Ran(result) => result,
        }
    }

    async fn dispatch(&self, name: &str, arguments: serde_json::Value) -> Dispatch {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Model requested unknown tool");
            return Dispatch::Inline(ToolOutcome::Error {
                kind: ToolErrorKind::NotFound,
                message: format!("Error: Tool '{name}' not found"),
            });
        };

        let violations = tool.parameters_schema().validate(&arguments);
        if !violations.is_empty() {
            debug!(tool = %name, violations = violations.len(), "Rejected tool arguments");
            return Dispatch::Inline(ToolOutcome::Error {
                kind: ToolErrorKind::InvalidArguments,
                message: format!(
                    "Error: Invalid parameters for tool '{name}': {}",
                    violations.join("; ")
                ),
            });
        }

        let call_id = Uuid::new_v4().to_string();
        self.emit(ProvenanceEvent::CallStarted {
            call_id: call_id.clone(),
            tool_name: name.to_string(),
            arguments: arguments.clone(),
            session_id: self.context().session_id,
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let result = tool.execute(arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, output, error) = match &result {
            Ok(text) => (true, Some(truncate_chars(text, RESULT_PREVIEW_CHARS)), None),
            Err(e) => (false, None, Some(e.to_string())),
        };
        debug!(tool = %name, success, duration_ms, "Tool call finished");
        self.emit(ProvenanceEvent::CallFinished {
            call_id,
            tool_name: name.to_string(),
            success,
            result: output,
            error,
            duration_ms,
            timestamp: Utc::now(),
        });

        Dispatch::Ran(result)
    }

    fn emit(&self, event: ProvenanceEvent) {
        if !self.provenance_enabled {
            return;
        }
        if let Some(sink) = &self.provenance
            && let Err(e) = sink.record(&event)
        {
            warn!(event = event.kind(), error = %e, "Failed to record provenance");
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("context", &self.context())
            .field("provenance", &self.provenance.is_some())
            .finish()
    }
}
