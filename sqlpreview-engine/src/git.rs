//! Revision reads backed by the `git` command line.

use std::path::{Component, Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::baseline::RevisionSource;
use crate::error::{PreviewError, PreviewResult};

/// Reads files at past revisions from a local git checkout.
///
/// Relative schema paths are taken relative to the working directory (the
/// process's current directory unless overridden) and mapped onto the
/// repository top level, so the same file is found whichever subdirectory
/// the run starts in.
#[derive(Debug, Clone)]
pub struct GitRevisions {
    repo_dir: PathBuf,
    working_dir: Option<PathBuf>,
    git: PathBuf,
}

impl GitRevisions {
    /// Use the checkout at `repo_dir` and `git` from `PATH`.
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            working_dir: None,
            git: PathBuf::from("git"),
        }
    }

    /// Resolve relative schema paths against `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Use a specific git executable.
    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    async fn git(&self, args: &[&str]) -> std::io::Result<Output> {
        Command::new(&self.git)
            .args(args)
            .current_dir(&self.repo_dir)
            .kill_on_drop(true)
            .output()
            .await
    }

    /// Absolute form of `path`, with `..` resolved and symlinks in the
    /// existing part of the path followed.
    fn absolute_path(&self, path: &Path) -> std::io::Result<PathBuf> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let base = match &self.working_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir()?,
            };
            base.join(path)
        };
        let base = if joined.is_absolute() {
            joined
        } else {
            std::env::current_dir()?.join(joined)
        };
        Ok(resolve_existing(&normalize(&base)))
    }

    /// Slash-separated path of `path` relative to the repository top level.
    async fn object_path(&self, path: &Path) -> Result<String, String> {
        let absolute = self.absolute_path(path).map_err(|e| e.to_string())?;

        let output = self
            .git(&["rev-parse", "--show-toplevel"])
            .await
            .map_err(|e| e.to_string())?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        let toplevel = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        let toplevel = resolve_existing(&normalize(&toplevel));

        let relative = absolute
            .strip_prefix(&toplevel)
            .map_err(|_| format!("path is outside the repository at {}", toplevel.display()))?;
        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"))
    }
}

/// Lexically drop `.` and fold `..` into the preceding component.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Canonicalise the longest existing ancestor of `path` and re-append the rest.
///
/// The schema file itself may no longer exist in the working tree.
fn resolve_existing(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = std::fs::canonicalize(current) {
            let mut resolved = canonical;
            for part in missing.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[async_trait]
impl RevisionSource for GitRevisions {
    async fn read_at(&self, revision: &str, path: &Path) -> PreviewResult<Option<Vec<u8>>> {
        let display = path.display().to_string();
        let fail = |reason: String| PreviewError::baseline_read(revision, display.clone(), reason);

        let commit = format!("{}^{{commit}}", revision);
        let verify = self
            .git(&["rev-parse", "--verify", "--quiet", &commit])
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !verify.status.success() {
            return Err(fail("unknown revision".to_string()));
        }

        let object = format!("{}:{}", revision, self.object_path(path).await.map_err(|e| fail(e))?);
        let exists = self
            .git(&["cat-file", "-e", &object])
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !exists.status.success() {
            debug!(%object, "path not present at revision");
            return Ok(None);
        }

        let show = self
            .git(&["show", &object])
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !show.status.success() {
            return Err(fail(String::from_utf8_lossy(&show.stderr).trim().to_string()));
        }
        Ok(Some(show.stdout))
    }
}
