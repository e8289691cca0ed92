//! File read tool — read file contents with line numbers and ranges.

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use countbot_security::WorkspaceValidator;
use tracing::{info, warn};

pub struct FileReadTool {
    validator: WorkspaceValidator,
}

impl FileReadTool {
    pub fn new(validator: WorkspaceValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents with line numbers. \
         Supports reading specific line ranges with start_line/end_line (1-based, inclusive). \
         Examples: read full file → read_file(path='a.py'); \
         read lines 10-20 → read_file(path='a.py', start_line=10, end_line=20)"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property(
                "path",
                ParameterSchema::string().describe("Path to the file (relative to workspace or absolute)"),
            )
            .property(
                "start_line",
                ParameterSchema::integer()
                    .describe("Start line number (1-based, inclusive). Omit to start from beginning."),
            )
            .property(
                "end_line",
                ParameterSchema::integer()
                    .describe("End line number (1-based, inclusive). Omit to read to end."),
            )
            .property(
                "show_line_numbers",
                ParameterSchema::boolean().describe("Show line numbers in output (default: true)"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or_default();
        if path.is_empty() {
            return Ok("Error: Path parameter is required".into());
        }
        let show_numbers = arguments["show_line_numbers"].as_bool().unwrap_or(true);

        let file_path = match self.validator.resolve(path) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path, error = %e, "Read blocked");
                return Ok(format!("Error: {e}"));
            }
        };
        if !file_path.exists() {
            return Ok(format!("Error: File not found: {path}"));
        }
        if !file_path.is_file() {
            return Ok(format!("Error: Not a file: {path}"));
        }

        let content = match tokio::fs::read_to_string(&file_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Ok(format!("Error: File is not valid UTF-8 text: {path}"));
            }
            Err(e) => return Err(ToolError::failed("read_file", format!("Error reading file: {e}"))),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len() as i64;

        let start = arguments["start_line"].as_i64().map_or(1, |s| s.max(1));
        let end = arguments["end_line"].as_i64().map_or(total, |e| e.min(total));

        if start > total {
            return Ok(format!("Error: start_line ({start}) exceeds total lines ({total})"));
        }
        if start > end {
            return Ok(format!("Error: start_line ({start}) > end_line ({end})"));
        }

        let selected = &lines[(start - 1) as usize..end as usize];
        let body = if show_numbers {
            let width = end.to_string().len();
            selected
                .iter()
                .enumerate()
                .map(|(i, line)| format!("{:>width$}| {line}", start + i as i64))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            selected.join("\n")
        };

        let mut header = format!("[File: {path} | Lines: {total}");
        if start != 1 || end != total {
            header.push_str(&format!(" | Showing: {start}-{end}"));
        }
        header.push(']');

        info!(path = %path, start, end, total, "Read file");
        Ok(format!("{header}\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use countbot_security::WorkspaceScope;

    fn tool(root: &std::path::Path) -> FileReadTool {
        FileReadTool::new(WorkspaceValidator::new(WorkspaceScope::new(root, true)))
    }

    #[test]
    fn tool_definition() {
        let dir = tempfile::tempdir().unwrap();
        let schema = tool(dir.path()).parameters_schema().to_json();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
        assert_eq!(schema["properties"]["start_line"]["type"], "integer");
    }

    #[tokio::test]
    async fn read_whole_file_with_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha\nbeta\ngamma\n").unwrap();

        let out = tool(dir.path())
            .execute(serde_json::json!({"path": "a.txt"}))
            .await
            .unwrap();
        assert_eq!(out, "[File: a.txt | Lines: 3]\n1| alpha\n2| beta\n3| gamma");
    }

    #[tokio::test]
    async fn read_range_without_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let text: String = (1..=12).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("b.txt"), text).unwrap();

        let t = tool(dir.path());
        let out = t
            .execute(serde_json::json!({"path": "b.txt", "start_line": 9, "end_line": 11}))
            .await
            .unwrap();
        assert!(out.starts_with("[File: b.txt | Lines: 12 | Showing: 9-11]"));
        assert!(out.contains(" 9| line 9"));
        assert!(out.contains("11| line 11"));

        let plain = t
            .execute(serde_json::json!({"path": "b.txt", "start_line": 12, "show_line_numbers": false}))
            .await
            .unwrap();
        assert!(plain.ends_with("\nline 12"));
    }

    #[tokio::test]
    async fn bad_ranges_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.txt"), "one\ntwo\n").unwrap();
        let t = tool(dir.path());

        let out = t.execute(serde_json::json!({"path": "c.txt", "start_line": 5})).await.unwrap();
        assert_eq!(out, "Error: start_line (5) exceeds total lines (2)");

        let out = t
            .execute(serde_json::json!({"path": "c.txt", "start_line": 2, "end_line": 1}))
            .await
            .unwrap();
        assert_eq!(out, "Error: start_line (2) > end_line (1)");
    }

    #[tokio::test]
    async fn missing_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let t = tool(dir.path());

        let out = t.execute(serde_json::json!({"path": "nope.txt"})).await.unwrap();
        assert_eq!(out, "Error: File not found: nope.txt");
        let out = t.execute(serde_json::json!({"path": "sub"})).await.unwrap();
        assert_eq!(out, "Error: Not a file: sub");
    }

    #[tokio::test]
    async fn outside_workspace_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(dir.path())
            .execute(serde_json::json!({"path": "../../etc/passwd"}))
            .await
            .unwrap();
        assert!(out.starts_with("Error: Path '../../etc/passwd' is outside workspace"));
    }

    #[tokio::test]
    async fn binary_file_is_reported_inline() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image.bin"), [0xff, 0xfe, 0x00, 0x89]).unwrap();
        let out = tool(dir.path())
            .execute(serde_json::json!({"path": "image.bin"}))
            .await
            .unwrap();
        assert_eq!(out, "Error: File is not valid UTF-8 text: image.bin");
    }
}
