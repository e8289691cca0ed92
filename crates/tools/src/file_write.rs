//! File write tool — create, overwrite or append to files inside the workspace.

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use countbot_security::WorkspaceValidator;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub struct FileWriteTool {
    validator: WorkspaceValidator,
}

impl FileWriteTool {
    pub fn new(validator: WorkspaceValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Two modes:\n\
         - mode='overwrite' (default): create or overwrite the file\n\
         - mode='append': append to end of file (creates if not exists)\n\
         For large content, split into several calls and use mode='append' after the first."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property(
                "path",
                ParameterSchema::string().describe("Path to the file (relative to workspace or absolute)"),
            )
            .required_property("content", ParameterSchema::string().describe("Content to write"))
            .property(
                "mode",
                ParameterSchema::string()
                    .one_of(["overwrite", "append"])
                    .describe("Write mode: 'overwrite' (default) or 'append'"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or_default();
        if path.is_empty() {
            return Ok("Error: Path parameter is required".into());
        }
        let content = arguments["content"].as_str().unwrap_or_default();
        let append = arguments["mode"].as_str() == Some("append");

        let file_path = match self.validator.resolve(path) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path, error = %e, "Write blocked");
                return Ok(format!("Error: {e}"));
            }
        };

        let io_err = |e: std::io::Error| ToolError::failed("write_file", format!("Error writing file: {e}"));
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let chars = content.chars().count();
        if append && file_path.exists() {
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&file_path)
                .await
                .map_err(io_err)?;
            file.write_all(content.as_bytes()).await.map_err(io_err)?;
            file.flush().await.map_err(io_err)?;

            let total = tokio::fs::read_to_string(&file_path)
                .await
                .map(|s| s.chars().count())
                .map_err(io_err)?;
            info!(path = %path, added = chars, total, "Appended to file");
            return Ok(format!("Appended {chars} chars to {path} (total: {total})"));
        }

        tokio::fs::write(&file_path, content).await.map_err(io_err)?;
        if append {
            info!(path = %path, chars, "Created file in append mode");
            Ok(format!("Created {path} with {chars} chars (file was new)"))
        } else {
            info!(path = %path, chars, "Wrote file");
            Ok(format!("Wrote {chars} chars to {path}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use countbot_security::WorkspaceScope;

    fn tool(root: &std::path::Path) -> FileWriteTool {
        FileWriteTool::new(WorkspaceValidator::new(WorkspaceScope::new(root, true)))
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .execute(serde_json::json!({"path": "deep/nested/a.txt", "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(out, "Wrote 5 chars to deep/nested/a.txt");
        let written = std::fs::read_to_string(dir.path().join("deep/nested/a.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn append_mode() {
        let dir = tempfile::tempdir().unwrap();
        let t = tool(dir.path());

        let out = t
            .execute(serde_json::json!({"path": "log.txt", "content": "ab", "mode": "append"}))
            .await
            .unwrap();
        assert_eq!(out, "Created log.txt with 2 chars (file was new)");

        let out = t
            .execute(serde_json::json!({"path": "log.txt", "content": "cde", "mode": "append"}))
            .await
            .unwrap();
        assert_eq!(out, "Appended 3 chars to log.txt (total: 5)");
        assert_eq!(std::fs::read_to_string(dir.path().join("log.txt")).unwrap(), "abcde");
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "old content").unwrap();
        tool(dir.path())
            .execute(serde_json::json!({"path": "x.txt", "content": "new"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("x.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn write_outside_workspace_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("evil.txt");

        let out = tool(dir.path())
            .execute(serde_json::json!({"path": target.to_str().unwrap(), "content": "x"}))
            .await
            .unwrap();
        assert!(out.contains("is outside workspace"));
        assert!(!target.exists());
    }
}
