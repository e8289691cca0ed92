//! File search tool — wildcard name matching under a workspace directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use countbot_core::error::ToolError;
use countbot_core::schema::ParameterSchema;
use countbot_core::tool::Tool;
use countbot_security::WorkspaceValidator;
use glob::{MatchOptions, Pattern};
use tracing::{debug, info};

const MAX_LIMIT: usize = 100;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Which entry kinds a search reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryFilter {
    File,
    Dir,
    All,
}

#[derive(Debug, Clone, PartialEq)]
struct Hit {
    relative: PathBuf,
    is_dir: bool,
    size: u64,
}

pub struct FileSearchTool {
    validator: WorkspaceValidator,
    default_limit: usize,
}

impl FileSearchTool {
    pub fn new(validator: WorkspaceValidator) -> Self {
        Self {
            validator,
            default_limit: 20,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.clamp(1, MAX_LIMIT);
        self
    }
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file_search"
    }

    fn description(&self) -> &str {
        "Search files with wildcards (*.txt, *.pdf)"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object()
            .required_property("path", ParameterSchema::string().describe("Search directory"))
            .property(
                "pattern",
                ParameterSchema::string()
                    .describe("Pattern (* = any, ? = one)")
                    .default_value("*"),
            )
            .property(
                "type",
                ParameterSchema::string()
                    .one_of(["file", "dir", "all"])
                    .describe("Type filter")
                    .default_value("all"),
            )
            .property(
                "max_depth",
                ParameterSchema::integer()
                    .describe("Depth (-1 = unlimited)")
                    .default_value(-1),
            )
            .property(
                "limit",
                ParameterSchema::integer()
                    .min(1.0)
                    .max(MAX_LIMIT as f64)
                    .describe("Max results (1-100)"),
            )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"].as_str().unwrap_or_default();
        if path.is_empty() {
            return Ok("Error: path parameter is required".into());
        }
        let raw_pattern = arguments["pattern"].as_str().unwrap_or("*");
        let filter = match arguments["type"].as_str() {
            Some("file") => EntryFilter::File,
            Some("dir") => EntryFilter::Dir,
            _ => EntryFilter::All,
        };
        let max_depth = arguments["max_depth"]
            .as_i64()
            .and_then(|d| usize::try_from(d).ok());
        let limit = arguments["limit"]
            .as_u64()
            .map_or(self.default_limit, |n| (n as usize).clamp(1, MAX_LIMIT));

        let pattern = match Pattern::new(raw_pattern) {
            Ok(p) => p,
            Err(e) => return Ok(format!("Error: Invalid pattern '{raw_pattern}': {e}")),
        };
        let dir = match self.validator.resolve(path) {
            Ok(p) => p,
            Err(e) => return Ok(format!("Error: {e}")),
        };
        if !dir.exists() {
            return Ok(format!("Error: Path does not exist: {path}"));
        }
        if !dir.is_dir() {
            return Ok(format!("Error: Path is not a directory: {path}"));
        }

        info!(path = %path, pattern = %raw_pattern, "Searching files");
        let root = dir.clone();
        let hits = tokio::task::spawn_blocking(move || {
            let mut hits = Vec::new();
            walk(&root, &root, &pattern, filter, max_depth, 0, &mut hits);
            hits
        })
        .await
        .map_err(|e| ToolError::failed("file_search", format!("Error during file search: {e}")))?;

        if hits.is_empty() {
            return Ok(format!("No files found matching pattern '{raw_pattern}' in: {path}"));
        }

        let total = hits.len();
        let shown = total.min(limit);
        let mut lines = vec![format!("Found {shown} file(s) matching '{raw_pattern}' in: {path}")];
        if total > shown {
            lines.push(format!(
                "(Showing first {shown} of {total} results. Use 'limit' parameter to see more)"
            ));
        }
        lines.push(String::new());
        for hit in hits.iter().take(shown) {
            let name = hit.relative.display();
            if hit.is_dir {
                lines.push(format!("[DIR] {name}"));
            } else {
                lines.push(format!("[FILE] {name} ({})", format_size(hit.size)));
            }
        }

        info!(shown, total, "File search completed");
        Ok(lines.join("\n"))
    }
}

/// Depth-first walk in name order. Symlinks are never followed, so the walk
/// cannot leave `root`. Unreadable entries are skipped.
fn walk(
    root: &Path,
    dir: &Path,
    pattern: &Pattern,
    filter: EntryFilter,
    max_depth: Option<usize>,
    depth: usize,
    hits: &mut Vec<Hit>,
) {
    if max_depth.is_some_and(|max| depth > max) {
        return;
    }
    let mut entries: Vec<_> = match std::fs::read_dir(dir) {
        Ok(reader) => reader.filter_map(Result::ok).collect(),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot read directory");
            return;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }
        let path = entry.path();
        let is_dir = file_type.is_dir();
        let wanted = match filter {
            EntryFilter::File => file_type.is_file(),
            EntryFilter::Dir => is_dir,
            EntryFilter::All => true,
        };

        let name = entry.file_name();
        if wanted && pattern.matches_with(&name.to_string_lossy(), MATCH_OPTIONS) {
            let size = if is_dir { 0 } else { entry.metadata().map_or(0, |m| m.len()) };
            hits.push(Hit {
                relative: path.strip_prefix(root).unwrap_or(path.as_path()).to_path_buf(),
                is_dir,
                size,
            });
        }
        if is_dir {
            walk(root, &path, pattern, filter, max_depth, depth + 1, hits);
        }
    }
}

fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use countbot_security::WorkspaceScope;
    use serde_json::json;

    fn tool(root: &Path) -> FileSearchTool {
        FileSearchTool::new(WorkspaceValidator::new(WorkspaceScope::new(root, true)))
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs/deep")).unwrap();
        std::fs::write(dir.path().join("README.TXT"), "hello").unwrap();
        std::fs::write(dir.path().join("docs/notes.txt"), "x".repeat(2048)).unwrap();
        std::fs::write(dir.path().join("docs/deep/old.txt"), "").unwrap();
        std::fs::write(dir.path().join("docs/plan.md"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn matches_names_case_insensitively_in_walk_order() {
        let dir = tree();
        let out = tool(dir.path())
            .execute(json!({"path": ".", "pattern": "*.txt"}))
            .await
            .unwrap();
        let expected = [
            "Found 3 file(s) matching '*.txt' in: .",
            "",
            "[FILE] README.TXT (5.00 B)",
            "[FILE] docs/deep/old.txt (0.00 B)",
            "[FILE] docs/notes.txt (2.00 KB)",
        ];
        assert_eq!(out, expected.join("\n"));
    }

    #[tokio::test]
    async fn type_filter_and_depth_limit() {
        let dir = tree();
        let t = tool(dir.path());

        let out = t.execute(json!({"path": ".", "type": "dir"})).await.unwrap();
        assert!(out.contains("[DIR] docs\n[DIR] docs/deep"));
        assert!(!out.contains("[FILE]"));

        let out = t
            .execute(json!({"path": ".", "pattern": "*.txt", "max_depth": 1}))
            .await
            .unwrap();
        assert!(out.contains("docs/notes.txt"));
        assert!(!out.contains("old.txt"));
    }

    #[tokio::test]
    async fn limit_reports_hidden_results() {
        let dir = tree();
        let out = tool(dir.path())
            .execute(json!({"path": "docs", "limit": 1}))
            .await
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Found 1 file(s) matching '*' in: docs");
        assert_eq!(
            lines[1],
            "(Showing first 1 of 4 results. Use 'limit' parameter to see more)"
        );
        assert_eq!(lines[3], "[DIR] deep");
    }

    #[tokio::test]
    async fn confined_to_workspace() {
        let dir = tree();
        let out = tool(dir.path())
            .execute(json!({"path": "../", "pattern": "*"}))
            .await
            .unwrap();
        assert!(out.contains("is outside workspace"), "{out}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_are_not_followed() {
        let dir = tree();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let out = tool(dir.path())
            .execute(json!({"path": ".", "pattern": "secret*"}))
            .await
            .unwrap();
        assert_eq!(out, "No files found matching pattern 'secret*' in: .");
    }

    #[tokio::test]
    async fn bad_input_is_reported_inline() {
        let dir = tree();
        let t = tool(dir.path());
        assert_eq!(
            t.execute(json!({})).await.unwrap(),
            "Error: path parameter is required"
        );
        assert_eq!(
            t.execute(json!({"path": "README.TXT"})).await.unwrap(),
            "Error: Path is not a directory: README.TXT"
        );
        assert_eq!(
            t.execute(json!({"path": "ghost"})).await.unwrap(),
            "Error: Path does not exist: ghost"
        );
        assert!(
            t.execute(json!({"path": ".", "pattern": "[z-a"}))
                .await
                .unwrap()
                .starts_with("Error: Invalid pattern '[z-a'")
        );
    }
}
