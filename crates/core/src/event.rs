//! Domain events and tool observers.
//!
//! The agent loop notifies a [`ToolObserver`] when a tool call starts,
//! succeeds or fails. Notification is best-effort: an observer error is
//! logged by the loop and never aborts it. [`EventBus`] is the stock observer,
//! fanning events out to any number of subscribers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::ObserverError;

/// Lifecycle of one tool call inside the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolEvent {
    Started {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    Succeeded {
        call_id: String,
        tool_name: String,
        result: String,
        duration_ms: u64,
    },
    Failed {
        call_id: String,
        tool_name: String,
        error: String,
        duration_ms: u64,
    },
}

impl ToolEvent {
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Started { tool_name, .. }
            | Self::Succeeded { tool_name, .. }
            | Self::Failed { tool_name, .. } => tool_name,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::Started { call_id, .. }
            | Self::Succeeded { call_id, .. }
            | Self::Failed { call_id, .. } => call_id,
        }
    }
}

/// Receives tool lifecycle notifications.
#[async_trait]
pub trait ToolObserver: Send + Sync {
    async fn notify(&self, session_id: &str, event: &ToolEvent) -> Result<(), ObserverError>;
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A tool call changed state
    Tool {
        session_id: String,
        event: ToolEvent,
        timestamp: DateTime<Utc>,
    },

    /// The agent finished processing a user turn
    ResponseCompleted {
        session_id: String,
        iterations: u32,
        tool_calls: u32,
        termination: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ToolObserver for EventBus {
    async fn notify(&self, session_id: &str, event: &ToolEvent) -> Result<(), ObserverError> {
        self.publish(DomainEvent::Tool {
            session_id: session_id.to_string(),
            event: event.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
