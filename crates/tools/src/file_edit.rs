//! File edit tool — exact text replacement or line-based edits.

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use countbot_security::WorkspaceValidator;
use tracing::{info, warn};

pub struct FileEditTool {
    validator: WorkspaceValidator,
}

impl FileEditTool {
    pub fn new(validator: WorkspaceValidator) -> Self {
        Self { validator }
    }
}

/// Outcome of an in-memory edit: the new file content and the message for the model.
enum Edit {
    Applied { content: String, message: String },
    Refused(String),
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file. Two modes:\n\
         1. Text replace: edit_file(path, old_text='X', new_text='Y')\n\
         2. Line edit (use read_file to see line numbers first):\n\
            - Replace lines: edit_file(path, start_line=5, end_line=8, new_text='...')\n\
            - Insert before line: edit_file(path, start_line=5, new_text='...', insert=true)\n\
            - Delete lines: edit_file(path, start_line=5, end_line=8, new_text='')"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property("path", ParameterSchema::string().describe("Path to the file to edit"))
            .property(
                "old_text",
                ParameterSchema::string().describe("Text to find and replace (text replace mode)"),
            )
            .property("new_text", ParameterSchema::string().describe("Replacement text (both modes)"))
            .property(
                "start_line",
                ParameterSchema::integer().describe("Start line number (1-based, line edit mode)"),
            )
            .property(
                "end_line",
                ParameterSchema::integer().describe("End line number (1-based, defaults to start_line)"),
            )
            .property(
                "insert",
                ParameterSchema::boolean()
                    .describe("Insert before start_line instead of replacing (default: false)"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or_default();
        if path.is_empty() {
            return Ok("Error: Path parameter is required".into());
        }
        let new_text = arguments["new_text"].as_str().unwrap_or_default();

        let file_path = match self.validator.resolve(path) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path, error = %e, "Edit blocked");
                return Ok(format!("Error: {e}"));
            }
        };
        if !file_path.exists() {
            return Ok(format!("Error: File not found: {path}"));
        }

        let io_err = |e: std::io::Error| ToolError::failed("edit_file", format!("Error editing file: {e}"));
        let content = tokio::fs::read_to_string(&file_path).await.map_err(io_err)?;

        let edit = if let Some(start) = arguments["start_line"].as_i64() {
            edit_lines(
                &content,
                start,
                arguments["end_line"].as_i64(),
                new_text,
                arguments["insert"].as_bool().unwrap_or(false),
            )
        } else if let Some(old_text) = arguments["old_text"].as_str() {
            edit_text(&content, old_text, new_text)
        } else {
            Edit::Refused("Error: Provide 'old_text' (text mode) or 'start_line' (line mode)".into())
        };

        match edit {
            Edit::Applied { content, message } => {
                tokio::fs::write(&file_path, content).await.map_err(io_err)?;
                info!(path = %path, action = %message, "Edited file");
                Ok(format!("Edited {path}{message}"))
            }
            Edit::Refused(message) => Ok(message),
        }
    }
}

fn edit_text(content: &str, old_text: &str, new_text: &str) -> Edit {
    if old_text.is_empty() {
        return Edit::Refused("Error: old_text is required for text replace mode".into());
    }
    match content.matches(old_text).count() {
        0 => Edit::Refused(format!(
            "Error: old_text not found in file ({} lines, {} chars). Use read_file to check exact content.",
            content.lines().count(),
            content.chars().count()
        )),
        1 => Edit::Applied {
            content: content.replacen(old_text, new_text, 1),
            message: " (replaced 1 occurrence)".into(),
        },
        n => Edit::Refused(format!(
            "Warning: old_text found {n} times. Add more context to make it unique."
        )),
    }
}

fn edit_lines(content: &str, start: i64, end: Option<i64>, new_text: &str, insert: bool) -> Edit {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total = lines.len() as i64;

    if start < 1 || start > total + 1 {
        return Edit::Refused(format!("Error: start_line ({start}) out of range (1-{total})"));
    }

    let replacement = terminated_lines(new_text);
    let start_idx = (start - 1) as usize;

    if insert {
        let mut result = lines[..start_idx].concat();
        result.push_str(&replacement.concat());
        result.push_str(&lines[start_idx..].concat());
        return Edit::Applied {
            content: result,
            message: format!(": Inserted {} lines before line {start}", replacement.len()),
        };
    }

    let end = end.unwrap_or(start);
    if end < start {
        return Edit::Refused(format!("Error: end_line ({end}) < start_line ({start})"));
    }
    if end > total {
        return Edit::Refused(format!("Error: end_line ({end}) exceeds total lines ({total})"));
    }

    let mut result = lines[..start_idx].concat();
    result.push_str(&replacement.concat());
    result.push_str(&lines[end as usize..].concat());

    let message = if new_text.is_empty() {
        format!(": Deleted lines {start}-{end}")
    } else {
        format!(": Replaced lines {start}-{end} with {} lines", replacement.len())
    };
    Edit::Applied { content: result, message }
}

/// Split into lines that each end with a newline.
fn terminated_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n')
        .map(|line| {
            if line.ends_with('\n') {
                line.to_string()
            } else {
                format!("{line}\n")
            }
        })
        .collect()
}
