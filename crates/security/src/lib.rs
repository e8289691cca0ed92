//! Security module for CountBot — path confinement, command screening, and audit logging.
//!
//! Provides:
//! - **Path validation**: Filesystem confinement to the workspace directory
//! - **Command guard**: Allowlist, dangerous-pattern denylist and path checks for shell commands
//! - **Audit logging**: Provenance sinks (in-memory, tracing, daily JSONL files)

pub mod audit;
pub mod command;
pub mod path;

pub use audit::{AuditLogger, DEFAULT_AUDIT_CAPACITY, JsonlFileSink, TracingSink};
pub use command::{CommandGuard, CommandRejection, DEFAULT_DENY_PATTERNS, GuardError, GuardPolicy};
pub use path::{PathValidationError, WorkspaceScope, WorkspaceValidator};
