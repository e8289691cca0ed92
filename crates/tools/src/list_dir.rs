//! Directory listing tool.

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use countbot_security::WorkspaceValidator;
use tracing::info;

pub struct ListDirTool {
    validator: WorkspaceValidator,
}

impl ListDirTool {
    pub fn new(validator: WorkspaceValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory. Returns files and subdirectories with sizes."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object().property(
            "path",
            ParameterSchema::string()
                .describe("Directory path (relative or absolute). Use '.' for workspace root.")
                .default_value("."),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        let dir_path = match self.validator.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(format!("Error: {e}")),
        };
        if !dir_path.exists() {
            return Ok(format!("Error: Directory not found: {path}"));
        }
        if !dir_path.is_dir() {
            return Ok(format!("Error: Not a directory: {path}"));
        }

        let io_err = |e: std::io::Error| ToolError::failed("list_dir", format!("Error listing directory: {e}"));
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir_path).await.map_err(io_err)?;
        while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
            let meta = entry.metadata().await.map_err(io_err)?;
            entries.push((entry.file_name().to_string_lossy().into_owned(), meta));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let lines: Vec<String> = entries
            .iter()
            .map(|(name, meta)| {
                let kind = if meta.is_dir() { "dir" } else { "file" };
                let size = if meta.is_file() { meta.len() } else { 0 };
                format!("{kind:4} {name:40} {size:>10} bytes")
            })
            .collect();

        info!(path = %path, items = lines.len(), "Listed directory");
        Ok(format!("Contents of {path}:\n{}", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use countbot_security::WorkspaceScope;

    fn tool(root: &std::path::Path) -> ListDirTool {
        ListDirTool::new(WorkspaceValidator::new(WorkspaceScope::new(root, true)))
    }

    #[tokio::test]
    async fn lists_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let out = tool(dir.path()).execute(serde_json::json!({})).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Contents of .:");
        assert!(lines[1].starts_with("dir  a_dir"));
        assert!(lines[2].starts_with("file b.txt"));
        assert!(lines[2].ends_with("5 bytes"));
    }

    #[tokio::test]
    async fn missing_or_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();
        let t = tool(dir.path());

        let out = t.execute(serde_json::json!({"path": "ghost"})).await.unwrap();
        assert_eq!(out, "Error: Directory not found: ghost");
        let out = t.execute(serde_json::json!({"path": "f.txt"})).await.unwrap();
        assert_eq!(out, "Error: Not a directory: f.txt");
    }

    #[tokio::test]
    async fn listing_outside_workspace_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path()).execute(serde_json::json!({"path": "/"})).await.unwrap();
        assert!(out.contains("is outside workspace"));
    }
}
