//! Subcommand implementations and the setup they share.

pub mod check;
pub mod config_cmd;
pub mod onboard;
pub mod run;
pub mod tools;

use std::sync::Arc;

use countbot_config::AppConfig;
use countbot_core::provenance::ProvenanceSink;
use countbot_security::{AuditLogger, JsonlFileSink, TracingSink, WorkspaceScope};

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The configured workspace, created on first use.
pub(crate) fn workspace_scope(config: &AppConfig) -> Result<WorkspaceScope, Box<dyn std::error::Error>> {
    let root = config.workspace_dir();
    if !root.exists() {
        std::fs::create_dir_all(&root)?;
        tracing::info!(path = %root.display(), "Created workspace directory");
    }
    Ok(WorkspaceScope::new(root, config.security.restrict_to_workspace))
}

/// Audit sinks per `[security]`: always traced, and written to daily
/// JSONL files when `audit_log_enabled` is set.
pub(crate) fn audit_sink(config: &AppConfig) -> Arc<dyn ProvenanceSink> {
    let mut sinks: Vec<Box<dyn ProvenanceSink>> = vec![Box::new(TracingSink)];
    if config.security.audit_log_enabled {
        let files = JsonlFileSink::new(config.audit_log_dir());
        if let Err(e) = files.prune(config.security.audit_retention_days) {
            tracing::warn!(error = %e, "Failed to prune audit logs");
        }
        sinks.push(Box::new(files));
    }
    Arc::new(AuditLogger::with_sinks(sinks))
}
