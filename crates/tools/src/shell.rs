//! Shell tool — execute system commands inside the workspace.
//!
//! Every command passes the [`CommandGuard`] first. Supports a working
//! directory, timeout, and output truncation.

use std::process::Stdio;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::{Tool, ToolContext};
use countbot_security::{CommandGuard, WorkspaceValidator};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    guard: CommandGuard,
    validator: WorkspaceValidator,
    timeout: Duration,
    max_output_length: usize,
    context: RwLock<ToolContext>,
}

impl ShellTool {
    pub fn new(guard: CommandGuard, validator: WorkspaceValidator) -> Self {
        Self {
            guard,
            validator,
            timeout: Duration::from_secs(30),
            max_output_length: 10_000,
            context: RwLock::new(ToolContext::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_length(mut self, max: usize) -> Self {
        self.max_output_length = max;
        self
    }

    fn command_for(command: &str) -> Command {
        if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }

    fn truncate(&self, text: String) -> String {
        let total = text.chars().count();
        if total <= self.max_output_length {
            return text;
        }
        warn!(limit = self.max_output_length, total, "Command output truncated");
        let kept: String = text.chars().take(self.max_output_length).collect();
        format!(
            "{kept}\n... (output truncated, {} more chars)",
            total - self.max_output_length
        )
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return combined stdout/stderr. \
         Dangerous commands are blocked by default."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property(
                "command",
                ParameterSchema::string().describe("The shell command to execute"),
            )
            .property(
                "working_dir",
                ParameterSchema::string()
                    .describe("Optional working directory for the command (relative to workspace)"),
            )
    }

    fn set_context(&self, context: &ToolContext) {
        *self.context.write().unwrap_or_else(|e| e.into_inner()) = context.clone();
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let command = arguments["command"].as_str().unwrap_or_default();
        if command.trim().is_empty() {
            return Ok("Error: Command parameter is required".into());
        }

        let scope = self.validator.scope();
        let root = scope.canonical_root();
        let cwd = match arguments["working_dir"].as_str().filter(|d| !d.trim().is_empty()) {
            Some(dir) => match self.validator.resolve(dir) {
                Ok(path) => path,
                Err(_) => return Ok(format!("Error: Working directory outside workspace: {dir}")),
            },
            None => root.clone(),
        };
        if !cwd.is_dir() {
            return Ok(format!("Error: Working directory not found: {}", cwd.display()));
        }

        if let Err(rejection) = self.guard.check(command, &cwd, &root) {
            return Ok(format!("Error: {rejection}"));
        }

        let context = self.context.read().unwrap_or_else(|e| e.into_inner()).clone();
        let mut cmd = Self::command_for(command);
        cmd.current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(session) = &context.session_id {
            cmd.env("COUNTBOT_SESSION_ID", session);
        }
        if let Some(channel) = &context.channel {
            cmd.env("COUNTBOT_CHANNEL", channel);
        }

        info!(command = %command, cwd = %cwd.display(), "Executing shell command");
        let child = cmd
            .spawn()
            .map_err(|e| ToolError::failed("exec", format!("Error executing command: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| ToolError::failed("exec", format!("Error executing command: {e}")))?
            }
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Ok(format!(
                    "Error: Command timed out after {} seconds",
                    self.timeout.as_secs()
                ));
            }
        };

        let mut parts = Vec::new();
        let stdout = normalize_newlines(&String::from_utf8_lossy(&output.stdout));
        if !stdout.is_empty() {
            parts.push(stdout);
        }
        let stderr = normalize_newlines(&String::from_utf8_lossy(&output.stderr));
        if !stderr.trim().is_empty() {
            parts.push(format!("STDERR:\n{stderr}"));
        }
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            parts.push(format!("\nExit code: {code}"));
        } else {
            debug!(command = %command, "Command succeeded");
        }

        let result = if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        };
        Ok(self.truncate(result))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use countbot_security::{GuardPolicy, WorkspaceScope};

    fn tool(root: &std::path::Path) -> ShellTool {
        let guard = CommandGuard::new(GuardPolicy {
            restrict_to_workspace: true,
            ..GuardPolicy::default()
        })
        .unwrap();
        ShellTool::new(guard, WorkspaceValidator::new(WorkspaceScope::new(root, true)))
    }

    #[tokio::test]
    async fn execute_echo() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn runs_in_workspace_and_subdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/marker.txt"), "").unwrap();

        let out = tool(dir.path())
            .execute(serde_json::json!({"command": "ls", "working_dir": "sub"}))
            .await
            .unwrap();
        assert!(out.contains("marker.txt"));
    }

    #[tokio::test]
    async fn blocked_commands_never_run() {
        let dir = tempfile::tempdir().unwrap();
        let t = tool(dir.path());

        let out = t.execute(serde_json::json!({"command": "rm -rf /"})).await.unwrap();
        assert!(out.starts_with("Error: Command blocked by safety guard (dangerous pattern detected"));

        let out = t
            .execute(serde_json::json!({"command": "cat ../../etc/passwd"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            "Error: Command blocked by safety guard (path traversal detected: ../../etc/passwd)"
        );
    }

    #[tokio::test]
    async fn working_dir_outside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .execute(serde_json::json!({"command": "ls", "working_dir": "/"}))
            .await
            .unwrap();
        assert_eq!(out, "Error: Working directory outside workspace: /");
    }

    #[tokio::test]
    async fn stderr_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .execute(serde_json::json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert_eq!(out, "STDERR:\noops\n\n\nExit code: 3");
    }

    #[tokio::test]
    async fn no_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path()).execute(serde_json::json!({"command": "true"})).await.unwrap();
        assert_eq!(out, "(no output)");
    }

    #[tokio::test]
    async fn timeout_reported() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .with_timeout(Duration::from_secs(1))
            .execute(serde_json::json!({"command": "sleep 5"}))
            .await
            .unwrap();
        assert_eq!(out, "Error: Command timed out after 1 seconds");
    }

    #[tokio::test]
    async fn output_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .with_max_output_length(5)
            .execute(serde_json::json!({"command": "echo 0123456789"}))
            .await
            .unwrap();
        assert_eq!(out, "01234\n... (output truncated, 6 more chars)");
    }

    #[tokio::test]
    async fn session_context_exported_to_env() {
        let dir = tempfile::tempdir().unwrap();
        let t = tool(dir.path());
        t.set_context(&ToolContext {
            session_id: Some("s-42".into()),
            channel: Some("cli".into()),
        });
        let out = t
            .execute(serde_json::json!({"command": "echo $COUNTBOT_SESSION_ID $COUNTBOT_CHANNEL"}))
            .await
            .unwrap();
        assert_eq!(out, "s-42 cli\n");
    }
}
