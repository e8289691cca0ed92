//! Path validation — filesystem confinement to the workspace directory.
//!
//! [`WorkspaceScope`] is the live, shared setting (root + restrict flag).
//! [`WorkspaceValidator`] resolves tool-supplied paths against it on every
//! call, so changing the scope at runtime takes effect immediately.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Error returned when path validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside workspace '{root}'")]
    OutsideWorkspace { path: String, root: String },
}

#[derive(Debug, Clone)]
struct ScopeSettings {
    root: PathBuf,
    restricted: bool,
}

/// Shared, runtime-updatable workspace settings.
///
/// Cloning yields another handle to the same settings.
#[derive(Debug, Clone)]
pub struct WorkspaceScope {
    inner: Arc<RwLock<ScopeSettings>>,
}

impl WorkspaceScope {
    pub fn new(root: impl Into<PathBuf>, restricted: bool) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ScopeSettings {
                root: root.into(),
                restricted,
            })),
        }
    }

    /// The workspace root as configured (not canonicalized).
    pub fn root(&self) -> PathBuf {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).root.clone()
    }

    pub fn is_restricted(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).restricted
    }

    pub fn set_root(&self, root: impl Into<PathBuf>) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).root = root.into();
    }

    pub fn set_restricted(&self, restricted: bool) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).restricted = restricted;
    }

    /// The root with symlinks resolved, for descendant checks.
    pub fn canonical_root(&self) -> PathBuf {
        canonicalize_lenient(&self.root())
    }
}

/// Resolves tool paths against the live workspace scope.
#[derive(Debug, Clone)]
pub struct WorkspaceValidator {
    scope: WorkspaceScope,
}

impl WorkspaceValidator {
    pub fn new(scope: WorkspaceScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> &WorkspaceScope {
        &self.scope
    }

    /// Resolve `path` to an absolute path.
    ///
    /// Relative paths are joined onto the workspace root as it is right now.
    /// When the scope is restricted, the result must be the root or inside it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let root = self.scope.root();
        let expanded = expand_tilde(path);
        let candidate = if expanded.is_absolute() {
            expanded
        } else {
            root.join(expanded)
        };
        let resolved = canonicalize_lenient(&candidate);

        if self.scope.is_restricted() {
            let canonical_root = canonicalize_lenient(&root);
            if !resolved.starts_with(&canonical_root) {
                return Err(PathValidationError::OutsideWorkspace {
                    path: path.to_string(),
                    root: root.display().to_string(),
                });
            }
        }

        Ok(resolved)
    }
}

/// Remove `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize as much of `path` as exists.
///
/// The deepest existing ancestor is resolved (following symlinks) and the
/// remaining components are appended. Works for files that do not exist yet.
pub fn canonicalize_lenient(path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);
    let mut existing = normalized.as_path();
    let mut rest: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut out = canonical;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = home_dir()
    {
        return home.join(path.trim_start_matches('~').trim_start_matches('/'));
    }
    PathBuf::from(path)
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
