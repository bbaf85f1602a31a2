//! Baseline schema materialisation.
//!
//! A baseline is the schema file as it looked at an earlier revision. It is
//! written to a uniquely named temporary file that lives exactly as long as
//! the returned [`BaselineArtifact`]; dropping the artifact removes the file,
//! whichever way the baseline step ends.
//!
//! A file that did not exist at the revision is reported as
//! [`BaselineArtifact::Absent`], which is not the same as an empty file: an
//! empty schema tells the engine to drop everything.

use std::path::Path;

use async_trait::async_trait;
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

use crate::error::PreviewResult;

/// Read access to files at past revisions.
#[async_trait]
pub trait RevisionSource: Send + Sync {
    /// Contents of `path` at `revision`, or `None` if the path did not exist there.
    async fn read_at(&self, revision: &str, path: &Path) -> PreviewResult<Option<Vec<u8>>>;
}

/// Result of resolving a baseline.
#[derive(Debug)]
pub enum BaselineArtifact {
    /// Baseline content written to a temporary file.
    Materialized(NamedTempFile),
    /// The schema file did not exist at the baseline revision.
    Absent,
}

impl BaselineArtifact {
    /// Path of the materialised file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            BaselineArtifact::Materialized(file) => Some(file.path()),
            BaselineArtifact::Absent => None,
        }
    }

    /// Whether the file was missing at the revision.
    pub fn is_absent(&self) -> bool {
        matches!(self, BaselineArtifact::Absent)
    }
}

/// Materialises baseline schema files under a run-scoped scratch directory.
pub struct BaselineResolver<'a> {
    revisions: &'a dyn RevisionSource,
    scratch: TempDir,
}

impl<'a> BaselineResolver<'a> {
    /// Create a resolver with a fresh scratch directory.
    pub fn new(revisions: &'a dyn RevisionSource) -> PreviewResult<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("sqlpreview-baseline-")
            .tempdir()?;
        Ok(Self { revisions, scratch })
    }

    /// Scratch directory holding the artifacts.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Fetch `schema_file` at `revision` and write it to a temporary file.
    pub async fn resolve(&self, revision: &str, schema_file: &Path) -> PreviewResult<BaselineArtifact> {
        let Some(content) = self.revisions.read_at(revision, schema_file).await? else {
            debug!(revision, path = %schema_file.display(), "schema file absent at revision");
            return Ok(BaselineArtifact::Absent);
        };

        let suffix = schema_file
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(&format!("baseline-{}-", short_revision(revision)))
            .suffix(&suffix)
            .tempfile_in(self.scratch.path())?;
        tokio::fs::write(file.path(), &content).await?;

        debug!(
            revision,
            path = %file.path().display(),
            bytes = content.len(),
            "materialised baseline"
        );
        Ok(BaselineArtifact::Materialized(file))
    }
}

/// File-name-safe abbreviation of a revision id.
fn short_revision(revision: &str) -> String {
    let cleaned: String = revision
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(12)
        .collect();
    if cleaned.is_empty() {
        "rev".to_string()
    } else {
        cleaned
    }
}
