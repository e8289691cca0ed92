//! Built-in tool implementations for CountBot.
//!
//! Tools give the agent the ability to interact with the world:
//! run shell commands, read, write, edit and search files, list
//! directories, and search or fetch the web. Every filesystem tool resolves paths through the
//! shared [`WorkspaceScope`], and the shell tool screens commands with the
//! [`CommandGuard`].

pub mod echo;
pub mod file_edit;
pub mod file_read;
pub mod file_search;
pub mod file_write;
pub mod list_dir;
pub mod shell;
pub mod web_fetch;
pub mod web_search;

use std::sync::Arc;
use std::time::Duration;

use countbot_config::AppConfig;
use countbot_core::error::{RegistryError, ToolError};
use countbot_core::provenance::ProvenanceSink;
use countbot_core::registry::ToolRegistry;
use countbot_security::{CommandGuard, GuardError, GuardPolicy, WorkspaceScope, WorkspaceValidator};

/// Failure while assembling the default tool set.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Build the command guard described by the `[security]` section.
pub fn command_guard(config: &AppConfig) -> Result<CommandGuard, GuardError> {
    let security = &config.security;
    CommandGuard::new(GuardPolicy {
        allow_dangerous: !security.dangerous_commands_blocked,
        deny_patterns: security.custom_deny_patterns.clone(),
        allow_patterns: security.allow_patterns().map(<[String]>::to_vec),
        restrict_to_workspace: security.restrict_to_workspace,
    })
}

/// Create a registry with all built-in tools.
///
/// Security defaults come from the config:
/// - Files: confined to `scope` while it is restricted
/// - Shell: dangerous patterns blocked, paths confined, timeout and output cap applied
pub fn default_registry(
    config: &AppConfig,
    scope: WorkspaceScope,
    provenance: Option<Arc<dyn ProvenanceSink>>,
) -> Result<ToolRegistry, SetupError> {
    let validator = WorkspaceValidator::new(scope);
    let shell = shell::ShellTool::new(command_guard(config)?, validator.clone())
        .with_timeout(Duration::from_secs(config.security.command_timeout_secs))
        .with_max_output_length(config.security.max_output_length);

    let mut registry = match provenance {
        Some(sink) => ToolRegistry::new().with_provenance(sink),
        None => ToolRegistry::new(),
    };
    registry.register(Box::new(echo::EchoTool))?;
    registry.register(Box::new(file_read::FileReadTool::new(validator.clone())))?;
    registry.register(Box::new(file_write::FileWriteTool::new(validator.clone())))?;
    registry.register(Box::new(file_edit::FileEditTool::new(validator.clone())))?;
    registry.register(Box::new(
        file_search::FileSearchTool::new(validator.clone())
            .with_default_limit(config.tools.file_search_max_results),
    ))?;
    registry.register(Box::new(list_dir::ListDirTool::new(validator)))?;
    registry.register(Box::new(shell))?;
    registry.register(Box::new(web_fetch::WebFetchTool::new(config.tools.web_fetch_max_chars)?))?;
    registry.register(Box::new(web_search::WebSearchTool::new(
        config.tools.web_search_api_key.clone(),
        config.tools.web_search_max_results,
    )?))?;

    tracing::debug!(tools = registry.len(), "Default tool registry ready");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(root: &std::path::Path) -> ToolRegistry {
        default_registry(&AppConfig::default(), WorkspaceScope::new(root, true), None).unwrap()
    }

    #[test]
    fn all_builtin_tools_registered_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = registry(dir.path())
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            [
                "echo",
                "edit_file",
                "exec",
                "file_search",
                "list_dir",
                "read_file",
                "web_fetch",
                "web_search",
                "write_file"
            ]
        );
    }

    #[tokio::test]
    async fn search_tools_follow_tools_config() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let mut config = AppConfig::default();
        config.tools.file_search_max_results = 2;
        let registry = default_registry(&config, WorkspaceScope::new(dir.path(), true), None).unwrap();

        let out = registry
            .execute("file_search", serde_json::json!({"path": ".", "pattern": "*.txt"}))
            .await
            .render();
        assert!(out.contains("(Showing first 2 of 3 results"), "{out}");

        let out = registry.execute("web_search", serde_json::json!({"query": "rust"})).await;
        assert_eq!(out.render(), "Error: BRAVE_API_KEY not configured");
    }

    #[test]
    fn invalid_custom_pattern_fails_setup() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.security.custom_deny_patterns = vec!["[".into()];
        let err = default_registry(&config, WorkspaceScope::new(dir.path(), true), None).unwrap_err();
        assert!(matches!(err, SetupError::Guard(_)));
    }

    #[test]
    fn whitelist_only_when_enabled() {
        let mut config = AppConfig::default();
        config.security.custom_allow_patterns = vec!["^git".into()];
        let dir = tempfile::tempdir().unwrap();

        let guard = command_guard(&config).unwrap();
        assert!(guard.check("ls", dir.path(), dir.path()).is_ok());

        config.security.command_whitelist_enabled = true;
        let guard = command_guard(&config).unwrap();
        assert!(guard.check("ls", dir.path(), dir.path()).is_err());
        assert!(guard.check("git log", dir.path(), dir.path()).is_ok());
    }

    #[tokio::test]
    async fn write_then_read_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let out = registry
            .execute("write_file", serde_json::json!({"path": "hello.txt", "content": "hi there"}))
            .await;
        assert!(out.is_ok());

        let out = registry.execute("read_file", serde_json::json!({"path": "hello.txt"})).await;
        assert_eq!(out.render(), "[File: hello.txt | Lines: 1]\n1| hi there");
    }

    #[tokio::test]
    async fn scope_changes_apply_to_every_tool() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("only_here.txt"), "x").unwrap();

        let scope = WorkspaceScope::new(first.path(), true);
        let registry = default_registry(&AppConfig::default(), scope.clone(), None).unwrap();

        let before = registry.execute("read_file", serde_json::json!({"path": "only_here.txt"})).await;
        assert!(before.render().starts_with("Error: File not found"));

        scope.set_root(second.path());
        let after = registry.execute("read_file", serde_json::json!({"path": "only_here.txt"})).await;
        assert!(after.render().ends_with("1| x"));
    }
}
