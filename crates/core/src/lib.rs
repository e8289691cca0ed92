//! # CountBot Core
//!
//! Domain types, traits, and error definitions for the CountBot tool-calling
//! runtime. Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`Provider`] streams model output
//! - [`Tool`] is one capability; [`ToolRegistry`] owns them
//! - [`ProvenanceSink`], [`ToolObserver`] and [`SessionStore`] receive what happened
//!
//! Implementations live in their respective crates, which keeps tests cheap
//! (mock providers, in-memory sinks) and the dependency graph flat.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provenance;
pub mod provider;
pub mod registry;
pub mod schema;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{LoopPhase, LoopState, Termination};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus, ToolEvent, ToolObserver};
pub use message::{ContentPart, ImageUrl, Message, MessageContent, Role, Transcript};
pub use provenance::{AuditRecord, ProvenanceEvent, ProvenanceSink};
pub use provider::{Provider, ProviderRequest, StreamChunk, ToolCallFragment, ToolDefinition};
pub use registry::ToolRegistry;
pub use schema::{ParameterSchema, SchemaType};
pub use session::{InMemorySessionStore, SessionStore};
pub use tool::{Tool, ToolCall, ToolContext, ToolErrorKind, ToolExecutionResult, ToolOutcome};
