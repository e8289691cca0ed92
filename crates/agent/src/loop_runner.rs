//! The agent reasoning loop implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use chrono::Utc;
use countbot_config::ModelConfig;
use countbot_core::agent::{LoopPhase, LoopState, Termination};
use countbot_core::event::{DomainEvent, EventBus, ToolEvent, ToolObserver};
use countbot_core::message::Message;
use countbot_core::provenance::{AuditRecord, ProvenanceEvent, ProvenanceSink};
use countbot_core::provider::{Provider, ProviderRequest, StreamChunk};
use countbot_core::registry::ToolRegistry;
use countbot_core::session::SessionStore;
use countbot_core::tool::ToolCall;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::{ContextBuilder, ContextInput};
use crate::turn::TurnAccumulator;

/// Session used by [`AgentLoop::process_direct`] when none is given.
pub const DIRECT_SESSION: &str = "cli:direct";

/// One user turn to process, plus optional context.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub message: String,
    pub session_id: String,
    pub history: Vec<Message>,
    pub media: Vec<PathBuf>,
    pub channel: Option<String>,
    pub chat_id: Option<String>,
    pub session_summary: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl MessageRequest {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            history: Vec::new(),
            media: Vec::new(),
            channel: None,
            chat_id: None,
            session_summary: None,
            cancel: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_media(mut self, media: Vec<PathBuf>) -> Self {
        self.media = media;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_session_summary(mut self, summary: impl Into<String>) -> Self {
        self.session_summary = Some(summary.into());
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Result of running one tool call with retries.
struct CallOutcome {
    result: Result<String, String>,
    duration_ms: u64,
}

/// The core agent loop that orchestrates streaming LLM calls and tool execution.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Builds the transcript for each user turn
    context: Arc<dyn ContextBuilder>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: u32,

    /// Caps both model iterations and tool calls per user turn
    max_iterations: u32,

    /// Attempts per tool call
    max_retries: u32,

    /// Fixed pause between attempts
    retry_delay: Duration,

    observer: Option<Arc<dyn ToolObserver>>,
    provenance: Option<Arc<dyn ProvenanceSink>>,
    sessions: Option<Arc<dyn SessionStore>>,
    event_bus: Option<Arc<EventBus>>,
}

impl AgentLoop {
    /// Create a new agent loop with default budgets.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        context: Arc<dyn ContextBuilder>,
    ) -> Self {
        Self {
            provider,
            tools,
            context,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            max_iterations: 25,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            observer: None,
            provenance: None,
            sessions: None,
            event_bus: None,
        }
    }

    /// Create an agent loop using the `[model]` config section.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        context: Arc<dyn ContextBuilder>,
        config: &ModelConfig,
    ) -> Self {
        Self::new(provider, &config.model, tools, context)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_iterations(config.max_iterations)
            .with_max_retries(config.max_retries)
            .with_retry_delay(Duration::from_millis(config.retry_delay_ms))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Set the maximum number of iterations (and tool calls) per user turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Attempts per tool call. Zero still makes one attempt.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_provenance(mut self, sink: Arc<dyn ProvenanceSink>) -> Self {
        self.provenance = Some(sink);
        self
    }

    pub fn with_sessions(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Process a user message, yielding visible text as it streams.
    ///
    /// The returned stream is lazy: nothing happens until it is polled.
    /// It ends when the model stops requesting tools, a budget runs out,
    /// the provider stream fails, or the cancel token fires. Cancellation
    /// is checked before each model call and before each tool call; a tool
    /// already running is not interrupted.
    pub fn process_message(&self, request: MessageRequest) -> impl Stream<Item = String> + Send + '_ {
        stream! {
            let MessageRequest {
                message,
                session_id,
                history,
                media,
                channel,
                chat_id,
                session_summary,
                cancel,
            } = request;
            let cancel = cancel.unwrap_or_default();

            self.tools.set_session(&session_id);
            if let Some(channel) = &channel {
                self.tools.set_channel(channel);
            }

            let mut transcript = self.context.build(&ContextInput {
                history,
                message: message.clone(),
                session_summary,
                media,
                channel,
                chat_id,
            });

            let mut state = LoopState::new(self.max_iterations);
            let mut final_content = String::new();
            let mut termination = Termination::IterationLimit;

            info!(session_id = %session_id, messages = transcript.len(), "Processing message");

            'iterations: while state.begin_iteration() {
                if cancel.is_cancelled() {
                    termination = Termination::Cancelled;
                    break;
                }

                state.enter(LoopPhase::Streaming);
                debug!(
                    session_id = %session_id,
                    iteration = state.iteration,
                    tool_calls = state.tool_calls,
                    "Agent loop iteration"
                );

                let request = ProviderRequest {
                    model: self.model.clone(),
                    messages: transcript.messages().to_vec(),
                    temperature: self.temperature,
                    max_tokens: Some(self.max_tokens),
                    tools: self.tools.definitions(),
                };

                let mut chunks = match self.provider.stream(request).await {
                    Ok(rx) => rx,
                    Err(e) => {
                        error!(session_id = %session_id, error = %e, "Provider stream failed to start");
                        yield format!("Error: {e}");
                        termination = Termination::StreamFailed;
                        break;
                    }
                };

                let mut turn = TurnAccumulator::new();
                let mut stream_error = None;
                while let Some(chunk) = chunks.recv().await {
                    match chunk {
                        Ok(StreamChunk::Content(delta)) => {
                            if !delta.is_empty() {
                                turn.push_content(&delta);
                                yield delta;
                            }
                        }
                        Ok(StreamChunk::Reasoning(delta)) => turn.push_reasoning(&delta),
                        Ok(StreamChunk::ToolCall(fragment)) => turn.push_fragment(fragment),
                        Ok(StreamChunk::Finish(reason)) => {
                            turn.finish(reason);
                            break;
                        }
                        Err(e) => {
                            stream_error = Some(e);
                            break;
                        }
                    }
                }

                if let Some(e) = stream_error {
                    error!(session_id = %session_id, error = %e, "Provider stream failed");
                    yield format!("Error: {e}");
                    termination = Termination::StreamFailed;
                    break;
                }

                debug!(finish_reason = ?turn.finish_reason(), tool_calls = turn.has_tool_calls(), "Turn finished");
                let (content, reasoning, calls) = turn.into_parts();
                if !content.is_empty() {
                    final_content = content.clone();
                }

                if calls.is_empty() {
                    termination = Termination::Completed;
                    break;
                }

                state.enter(LoopPhase::Dispatching);
                if let Err(e) =
                    self.context.append_assistant_turn(&mut transcript, &content, calls.clone(), reasoning)
                {
                    warn!(error = %e, "Failed to append assistant turn");
                }

                let mut calls = calls.into_iter();
                while let Some(call) = calls.next() {
                    if cancel.is_cancelled() {
                        termination = Termination::Cancelled;
                        break 'iterations;
                    }
                    if !state.begin_tool_call() {
                        warn!(
                            session_id = %session_id,
                            max = self.max_iterations,
                            "Reached max tool calls, skipping remaining calls"
                        );
                        // Every requested call still needs an answer in the transcript.
                        let skipped = format!("Error: Skipped, tool call limit ({}) reached", self.max_iterations);
                        for call in std::iter::once(call).chain(calls.by_ref()) {
                            if let Err(e) = self.context.append_tool_result(&mut transcript, &call.id, &call.name, &skipped) {
                                warn!(error = %e, "Failed to append tool result");
                            }
                        }
                        break;
                    }

                    info!(
                        session_id = %session_id,
                        tool = %call.name,
                        call = state.tool_calls,
                        max = self.max_iterations,
                        "Executing tool"
                    );
                    self.notify(&session_id, ToolEvent::Started {
                        call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await;

                    let outcome = self.run_with_retries(&call).await;
                    let text = match &outcome.result {
                        Ok(output) => output.clone(),
                        Err(error) => error.clone(),
                    };

                    self.record_call(&session_id, &message, &call, &outcome);
                    let event = match &outcome.result {
                        Ok(output) => ToolEvent::Succeeded {
                            call_id: call.id.clone(),
                            tool_name: call.name.clone(),
                            result: output.clone(),
                            duration_ms: outcome.duration_ms,
                        },
                        Err(error) => ToolEvent::Failed {
                            call_id: call.id.clone(),
                            tool_name: call.name.clone(),
                            error: error.clone(),
                            duration_ms: outcome.duration_ms,
                        },
                    };
                    self.notify(&session_id, event).await;

                    if let Err(e) = self.context.append_tool_result(&mut transcript, &call.id, &call.name, &text) {
                        warn!(error = %e, "Failed to append tool result");
                    }
                }
            }

            state.enter(LoopPhase::Done);
            if matches!(termination, Termination::Completed | Termination::IterationLimit)
                && !state.tool_budget_left()
            {
                termination = Termination::ToolCallLimit;
            }
            match termination {
                Termination::Cancelled => {
                    info!(session_id = %session_id, iteration = state.iteration, "Agent loop cancelled");
                    return;
                }
                Termination::StreamFailed => {
                    if let Some(bus) = &self.event_bus {
                        bus.publish(DomainEvent::ErrorOccurred {
                            context: format!("agent loop ({session_id})"),
                            error_message: "provider stream failed".into(),
                            timestamp: Utc::now(),
                        });
                    }
                    return;
                }
                Termination::ToolCallLimit | Termination::IterationLimit => {
                    warn!(session_id = %session_id, max = self.max_iterations, termination = %termination, "Budget reached");
                    if let Some(notice) = termination.notice(self.max_iterations) {
                        final_content.push_str(&notice);
                        yield notice;
                    }
                }
                Termination::Completed => {}
            }

            info!(
                session_id = %session_id,
                termination = %termination,
                iterations = state.iteration,
                tool_calls = state.tool_calls,
                "Agent loop finished"
            );
            if let Some(bus) = &self.event_bus {
                bus.publish(DomainEvent::ResponseCompleted {
                    session_id: session_id.clone(),
                    iterations: state.iteration,
                    tool_calls: state.tool_calls,
                    termination: termination.to_string(),
                    timestamp: Utc::now(),
                });
            }

            if !final_content.is_empty() {
                self.persist(&session_id, &message, &final_content).await;
            }
        }
    }

    /// Process a message and collect the whole response.
    pub async fn process_direct(&self, content: &str, session_id: Option<&str>) -> String {
        let request = MessageRequest::new(content, session_id.unwrap_or(DIRECT_SESSION))
            .with_channel("cli", "direct");
        self.process_message(request).collect::<Vec<_>>().await.concat()
    }

    /// Run one call, retrying execution failures with a fixed delay.
    async fn run_with_retries(&self, call: &ToolCall) -> CallOutcome {
        let attempts = self.attempts();
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.tools.execute_raising(&call.name, call.arguments.clone()).await {
                Ok(output) => {
                    debug!(tool = %call.name, attempt, "Tool succeeded");
                    return CallOutcome {
                        result: Ok(output),
                        duration_ms: started.elapsed().as_millis() as u64,
                    };
                }
                Err(e) => {
                    warn!(tool = %call.name, attempt, max = attempts, error = %e, "Tool attempt failed");
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let message = format!("Tool execution failed after {attempts} attempts: {last_error}");
        error!(tool = %call.name, error = %message, "Tool failed permanently");
        CallOutcome {
            result: Err(message),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn notify(&self, session_id: &str, event: ToolEvent) {
        if let Some(observer) = &self.observer
            && let Err(e) = observer.notify(session_id, &event).await
        {
            warn!(tool = %event.tool_name(), error = %e, "Tool observer failed");
        }
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::Tool {
                session_id: session_id.to_string(),
                event,
                timestamp: Utc::now(),
            });
        }
    }

    fn record_call(&self, session_id: &str, user_message: &str, call: &ToolCall, outcome: &CallOutcome) {
        let Some(sink) = &self.provenance else {
            return;
        };
        let (result, error) = match &outcome.result {
            Ok(output) => (Some(output.clone()), None),
            Err(e) => (None, Some(e.clone())),
        };
        let record = AuditRecord {
            call_id: call.id.clone(),
            session_id: session_id.to_string(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
            user_message: user_message.to_string(),
            result,
            error,
            duration_ms: outcome.duration_ms,
            timestamp: Utc::now(),
        };
        if let Err(e) = sink.record(&ProvenanceEvent::ToolConversation(record)) {
            warn!(tool = %call.name, error = %e, "Failed to record tool conversation");
        }
    }

    /// Hand the finished exchange to the session store and provenance sink.
    async fn persist(&self, session_id: &str, user_message: &str, response: &str) {
        if let Some(store) = &self.sessions
            && let Err(e) = store.append_exchange(session_id, user_message, response).await
        {
            warn!(session_id = %session_id, error = %e, "Failed to save session");
        }
        if let Some(sink) = &self.provenance {
            let event = ProvenanceEvent::Response {
                session_id: session_id.to_string(),
                user_message: user_message.to_string(),
                response: response.to_string(),
                timestamp: Utc::now(),
            };
            if let Err(e) = sink.record(&event) {
                warn!(session_id = %session_id, error = %e, "Failed to record response");
            }
        }
    }
}
