//! Shared test helpers for agent loop tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use countbot_core::error::{ProviderError, ToolError, TranscriptError};
use countbot_core::message::{Message, Transcript};
use countbot_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, ToolCallFragment};
use countbot_core::registry::ToolRegistry;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::context::{ContextBuilder, ContextInput};

pub type Script = Vec<Result<StreamChunk, ProviderError>>;

/// A mock provider that replays one scripted stream per call.
///
/// Once the scripts run out, `stream` fails with an API error.
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(mut scripts: Vec<Script>) -> Self {
        scripts.reverse();
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let Some(script) = self.scripts.lock().unwrap().pop() else {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "no more scripted responses".into(),
            });
        };

        let (tx, rx) = mpsc::channel(script.len().max(1));
        for item in script {
            tx.try_send(item).unwrap();
        }
        Ok(rx)
    }
}

pub fn content(text: &str) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk::Content(text.into()))
}

pub fn finish(reason: &str) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk::Finish(reason.into()))
}

pub fn tool_fragment(id: &str, name: Option<&str>, arguments: &str) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk::ToolCall(ToolCallFragment {
        id: id.into(),
        name: name.map(Into::into),
        arguments: arguments.into(),
    }))
}

/// Echoes its `message` argument.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object().required_property("message", ParameterSchema::string())
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        Ok(format!("Echo: {}", arguments["message"].as_str().unwrap_or("")))
    }
}

/// Fails the first `failures` attempts, then succeeds.
pub struct FlakyTool {
    failures: usize,
    attempts: Arc<AtomicUsize>,
}

impl FlakyTool {
    pub fn failing(failures: usize) -> (Self, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                failures,
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Fails a few times"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(ToolError::failed("flaky", format!("disk on fire ({attempt})")));
        }
        Ok("recovered".into())
    }
}

/// Cancels the token it holds when executed.
pub struct CancelTool(pub CancellationToken);

#[async_trait]
impl Tool for CancelTool {
    fn name(&self) -> &str {
        "cancel"
    }

    fn description(&self) -> &str {
        "Cancels the running request"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        self.0.cancel();
        Ok("cancelled".into())
    }
}

/// A registry holding [`EchoTool`] plus `extra`.
pub fn registry_with(extra: Vec<Box<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool)).unwrap();
    for tool in extra {
        registry.register(tool).unwrap();
    }
    registry
}

/// Minimal context builder that records what the loop appends.
#[derive(Default)]
pub struct RecordingContext {
    built_len: AtomicUsize,
    tool_results: Mutex<Vec<(String, String)>>,
}

impl RecordingContext {
    /// Length of the transcript as first built.
    pub fn transcript_len(&self) -> usize {
        self.built_len.load(Ordering::SeqCst)
    }

    /// `(call_id, text)` for every tool result appended.
    pub fn tool_results(&self) -> Vec<(String, String)> {
        self.tool_results.lock().unwrap().clone()
    }
}

impl ContextBuilder for RecordingContext {
    fn build(&self, input: &ContextInput) -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push(Message::system("You are a test agent.")).unwrap();
        for message in &input.history {
            transcript.push(message.clone()).unwrap();
        }
        transcript.push(Message::user(input.message.as_str())).unwrap();
        self.built_len.store(transcript.len(), Ordering::SeqCst);
        transcript
    }

    fn append_tool_result(
        &self,
        transcript: &mut Transcript,
        call_id: &str,
        name: &str,
        text: &str,
    ) -> Result<(), TranscriptError> {
        self.tool_results
            .lock()
            .unwrap()
            .push((call_id.to_string(), text.to_string()));
        transcript.push_tool_result(call_id, name, text)
    }
}
