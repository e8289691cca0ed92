//! Command safety guard — decides whether a shell command may run.
//!
//! Rules are checked in a fixed order and the first hit wins:
//! 1. allowlist (when configured)
//! 2. dangerous-pattern denylist (unless dangerous mode is on)
//! 3. workspace confinement of path-like tokens (when restricted)
//!
//! A rejected command is never run, partially or rewritten.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::path::{canonicalize_lenient, expand_tilde};

/// Builtin deny patterns.
///
/// Covers recursive delete, disk formatting, raw block-device writes,
/// shutdown/reboot, fork bombs and init level changes.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    r"\brm\s+-[rf]{1,2}\b",
    r"\bdel\s+/[fq]\b",
    r"\brmdir\s+/s\b",
    r"^(format|mkfs|diskpart)\b",
    r"\bdd\s+if=",
    r">\s*/dev/sd",
    r"\b(shutdown|reboot|poweroff|halt)\b",
    r":\(\)\s*\{.*\};\s*:",
    r"\binit\s+[06]\b",
];

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"']+"#).expect("valid URL regex"));
static WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[A-Za-z]:\\[^\s"']+"#).expect("valid Windows path regex"));
static POSIX_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)(/[^\s"']+)"#).expect("valid POSIX path regex"));
static RELATIVE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:\./|~/)[^\s"']+"#).expect("valid relative path regex"));

/// Construction error for a guard with bad patterns.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Invalid command pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Why a command was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejection {
    #[error("Command blocked by safety guard (not in allowlist)")]
    NotAllowlisted,

    #[error("Command blocked by safety guard (dangerous pattern detected: {pattern})")]
    DangerousPattern { pattern: String },

    #[error("Command blocked by safety guard (path traversal detected: {token})")]
    PathTraversal { token: String },

    #[error("Command blocked by safety guard (path outside working dir: {token})")]
    OutsideWorkspace { token: String },
}

/// Settings for building a [`CommandGuard`].
#[derive(Debug, Clone, Default)]
pub struct GuardPolicy {
    /// Skip the deny patterns entirely
    pub allow_dangerous: bool,
    /// Extra deny patterns, appended to [`DEFAULT_DENY_PATTERNS`]
    pub deny_patterns: Vec<String>,
    /// When set, commands must match at least one of these
    pub allow_patterns: Option<Vec<String>>,
    /// Reject commands touching paths outside the confinement root
    pub restrict_to_workspace: bool,
}

/// Compiled command policy.
#[derive(Debug, Clone)]
pub struct CommandGuard {
    allow_dangerous: bool,
    deny: Vec<Regex>,
    allow: Option<Vec<Regex>>,
    restrict_to_workspace: bool,
}

impl CommandGuard {
    pub fn new(policy: GuardPolicy) -> Result<Self, GuardError> {
        let deny = DEFAULT_DENY_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(policy.deny_patterns)
            .map(|p| compile(&p))
            .collect::<Result<Vec<_>, _>>()?;

        let allow = policy
            .allow_patterns
            .map(|patterns| patterns.iter().map(|p| compile(p)).collect::<Result<Vec<_>, _>>())
            .transpose()?;

        Ok(Self {
            allow_dangerous: policy.allow_dangerous,
            deny,
            allow,
            restrict_to_workspace: policy.restrict_to_workspace,
        })
    }

    pub fn restricts_to_workspace(&self) -> bool {
        self.restrict_to_workspace
    }

    /// Check `command`, about to run in `cwd`, against the policy.
    ///
    /// `root` is the confinement root; it is only consulted when the guard
    /// restricts to the workspace.
    pub fn check(&self, command: &str, cwd: &Path, root: &Path) -> Result<(), CommandRejection> {
        let lowered = command.trim().to_lowercase();

        if let Some(allow) = &self.allow
            && !allow.iter().any(|re| re.is_match(&lowered))
        {
            debug!(command = %command, "Command not in allowlist");
            return Err(CommandRejection::NotAllowlisted);
        }

        if !self.allow_dangerous
            && let Some(re) = self.deny.iter().find(|re| re.is_match(&lowered))
        {
            warn!(command = %command, pattern = %re.as_str(), "Blocked dangerous command");
            return Err(CommandRejection::DangerousPattern {
                pattern: re.as_str().to_string(),
            });
        }

        if self.restrict_to_workspace {
            self.check_paths(command, cwd, root)?;
        }

        Ok(())
    }

    fn check_paths(&self, command: &str, cwd: &Path, root: &Path) -> Result<(), CommandRejection> {
        if let Some(token) = traversal_token(command) {
            warn!(command = %command, token = %token, "Blocked path traversal");
            return Err(CommandRejection::PathTraversal { token });
        }

        let root = canonicalize_lenient(root);
        let cwd = canonicalize_lenient(cwd);

        for raw in extract_paths(command) {
            let expanded = expand_tilde(&raw);
            let mut resolved = canonicalize_lenient(&cwd.join(&expanded));

            if !resolved.exists() {
                let fallback = canonicalize_lenient(&root.join(&expanded));
                resolved = if fallback.exists() {
                    fallback
                } else {
                    resolved.parent().map(Path::to_path_buf).unwrap_or(resolved)
                };
            }

            if !resolved.starts_with(&root) {
                warn!(command = %command, token = %raw, "Blocked path outside workspace");
                return Err(CommandRejection::OutsideWorkspace { token: raw });
            }
        }

        Ok(())
    }
}

fn compile(pattern: &str) -> Result<Regex, GuardError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| GuardError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// The whitespace-delimited word containing a `../` or `..\` sequence.
fn traversal_token(command: &str) -> Option<String> {
    command
        .split_whitespace()
        .find(|word| word.contains("../") || word.contains("..\\"))
        .map(|word| word.trim_matches(|c| c == '"' || c == '\'').to_string())
}

/// Path-like tokens in `command`, ignoring anything inside a URL.
pub fn extract_paths(command: &str) -> Vec<String> {
    let stripped = URL_PATTERN.replace_all(command, " ");
    let mut paths: Vec<String> = Vec::new();

    for m in WINDOWS_PATH.find_iter(&stripped) {
        paths.push(m.as_str().to_string());
    }
    for caps in POSIX_PATH.captures_iter(&stripped) {
        if let Some(m) = caps.get(1) {
            paths.push(m.as_str().to_string());
        }
    }
    for m in RELATIVE_PATH.find_iter(&stripped) {
        paths.push(m.as_str().to_string());
    }

    paths.dedup();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(allow_dangerous: bool, restrict: bool) -> CommandGuard {
        CommandGuard::new(GuardPolicy {
            allow_dangerous,
            restrict_to_workspace: restrict,
            ..GuardPolicy::default()
        })
        .unwrap()
    }

    #[test]
    fn recursive_delete_blocked_unless_dangerous_mode() {
        let ws = tempfile::tempdir().unwrap();
        let err = guard(false, true).check("rm -rf /", ws.path(), ws.path()).unwrap_err();
        assert!(matches!(err, CommandRejection::DangerousPattern { .. }));
        assert!(err.to_string().contains("dangerous pattern detected"));

        assert!(guard(true, true).check("rm -rf /", ws.path(), ws.path()).is_ok());
        assert!(guard(true, false).check("rm -rf /", ws.path(), ws.path()).is_ok());
    }

    #[test]
    fn deny_patterns_are_case_insensitive() {
        let ws = tempfile::tempdir().unwrap();
        let g = guard(false, false);
        for cmd in [
            "RM -RF build",
            "sudo shutdown now",
            "dd if=/dev/zero of=/dev/sda",
            "echo x > /dev/sda",
            "mkfs.ext4 /dev/sdb1",
            ":(){ :|:& };:",
            "init 0",
            "del /f secrets.txt",
        ] {
            assert!(g.check(cmd, ws.path(), ws.path()).is_err(), "{cmd} should be blocked");
        }
        assert!(g.check("ls -la", ws.path(), ws.path()).is_ok());
        assert!(g.check("echo rebooting is fun", ws.path(), ws.path()).is_ok());
    }

    #[test]
    fn traversal_rejected_naming_token() {
        let ws = tempfile::tempdir().unwrap();
        let err = guard(false, true)
            .check("cat ../../etc/passwd", ws.path(), ws.path())
            .unwrap_err();
        assert_eq!(
            err,
            CommandRejection::PathTraversal { token: "../../etc/passwd".into() }
        );
        assert!(err.to_string().contains("../../etc/passwd"));
    }

    #[test]
    fn traversal_allowed_without_confinement() {
        let ws = tempfile::tempdir().unwrap();
        assert!(guard(false, false).check("cat ../../etc/passwd", ws.path(), ws.path()).is_ok());
    }

    #[test]
    fn absolute_path_outside_workspace_rejected() {
        let ws = tempfile::tempdir().unwrap();
        let err = guard(false, true).check("cat /etc/hostname", ws.path(), ws.path()).unwrap_err();
        assert_eq!(err, CommandRejection::OutsideWorkspace { token: "/etc/hostname".into() });
    }

    #[test]
    fn paths_inside_workspace_accepted() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("notes.txt"), "x").unwrap();
        let inside = ws.path().join("notes.txt");
        let g = guard(false, true);

        assert!(g.check(&format!("cat {}", inside.display()), ws.path(), ws.path()).is_ok());
        assert!(g.check("cat ./notes.txt", ws.path(), ws.path()).is_ok());
        // Not yet existing: the parent is checked instead
        assert!(g.check("touch ./new/file.txt", ws.path(), ws.path()).is_ok());
    }

    #[test]
    fn urls_are_not_treated_as_paths() {
        let ws = tempfile::tempdir().unwrap();
        let g = guard(false, true);
        assert!(g
            .check("curl https://example.com/etc/passwd -o ./page.html", ws.path(), ws.path())
            .is_ok());
    }

    #[test]
    fn allowlist_checked_first() {
        let ws = tempfile::tempdir().unwrap();
        let g = CommandGuard::new(GuardPolicy {
            allow_patterns: Some(vec![r"^git\b".into(), r"^ls\b".into()]),
            restrict_to_workspace: true,
            ..GuardPolicy::default()
        })
        .unwrap();

        assert!(g.check("git status", ws.path(), ws.path()).is_ok());
        assert!(g.check("LS -la", ws.path(), ws.path()).is_ok());
        assert_eq!(
            g.check("rm -rf /", ws.path(), ws.path()).unwrap_err(),
            CommandRejection::NotAllowlisted
        );
    }

    #[test]
    fn custom_deny_patterns_are_appended() {
        let ws = tempfile::tempdir().unwrap();
        let g = CommandGuard::new(GuardPolicy {
            deny_patterns: vec![r"\bsudo\b".into()],
            ..GuardPolicy::default()
        })
        .unwrap();
        assert!(g.check("sudo ls", ws.path(), ws.path()).is_err());
        assert!(g.check("rm -rf x", ws.path(), ws.path()).is_err());
    }

    #[test]
    fn invalid_pattern_is_a_construction_error() {
        let err = CommandGuard::new(GuardPolicy {
            deny_patterns: vec!["(unclosed".into()],
            ..GuardPolicy::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn path_extraction() {
        let paths = extract_paths(r#"cp /tmp/a.txt ./b.txt && type C:\data\x.log && wget http://h/p"#);
        assert!(paths.contains(&"/tmp/a.txt".to_string()));
        assert!(paths.contains(&"./b.txt".to_string()));
        assert!(paths.contains(&r"C:\data\x.log".to_string()));
        assert!(!paths.iter().any(|p| p.contains("h/p")));
    }
}
