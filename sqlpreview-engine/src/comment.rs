//! Preview comments on change requests.
//!
//! Each comment carries a hidden, versioned identity marker. On later runs
//! the publisher looks for the most recent comment by the automation author
//! containing that marker and edits it, so a change request never collects
//! more than one preview per identity.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::PreviewResult;
use crate::kind::DatabaseKind;

/// Versioned prefix of every identity marker.
pub const MARKER_PREFIX: &str = "sqlpreview:v1";

/// Title used when none is configured.
pub const DEFAULT_TITLE: &str = "SQL Preview";

/// Login of the default Actions token.
pub const DEFAULT_COMMENT_AUTHOR: &str = "github-actions[bot]";

/// Sentence shown instead of a code block when there is nothing to apply.
pub const NO_CHANGES_TEXT: &str = "No schema changes detected.";

/// Stable identity of a preview comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentIdentity(String);

impl CommentIdentity {
    /// Identity derived from the database kind and schema path.
    pub fn for_schema(kind: DatabaseKind, schema_file: &Path) -> Self {
        let path = schema_file
            .to_string_lossy()
            .replace('\\', "/")
            .trim_start_matches("./")
            .to_string();
        Self::sanitized(format!("{}:{}", kind, path))
    }

    /// Identity derived from a fixed comment title.
    pub fn for_title(title: &str) -> Self {
        Self::sanitized(format!("title:{}", title.trim()))
    }

    fn sanitized(raw: String) -> Self {
        // Keep the marker a well-formed HTML comment.
        let mut value = raw.replace(['\n', '\r'], " ");
        while value.contains("--") {
            value = value.replace("--", "-");
        }
        Self(value)
    }

    /// Hidden marker embedded in the comment body.
    pub fn marker(&self) -> String {
        format!("<!-- {}:{} -->", MARKER_PREFIX, self.0)
    }
}

impl fmt::Display for CommentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Change request a comment belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Change request number.
    pub number: u64,
}

/// A comment as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    /// Platform comment id.
    pub id: u64,
    /// Author login.
    pub author: String,
    /// Markdown body.
    pub body: String,
}

/// Comment operations of a code-review platform.
#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    /// All comments on the change request, oldest first.
    async fn list_comments(&self, target: &ChangeRequest) -> PreviewResult<Vec<ReviewComment>>;

    /// Post a new comment.
    async fn create_comment(&self, target: &ChangeRequest, body: &str) -> PreviewResult<ReviewComment>;

    /// Replace the body of an existing comment.
    async fn update_comment(
        &self,
        target: &ChangeRequest,
        id: u64,
        body: &str,
    ) -> PreviewResult<ReviewComment>;
}

/// Content of one preview comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewComment {
    /// Identity used to find the comment again.
    pub identity: CommentIdentity,
    /// Human title.
    pub title: String,
    /// Engine name and version, e.g. `psqldef v0.17.0`.
    pub engine: String,
    /// Schema file the preview was computed from.
    pub schema_file: String,
    /// Whether the engine reported any DDL.
    pub has_changes: bool,
    /// Engine output, already trimmed.
    pub text: String,
}

impl PreviewComment {
    /// Render the markdown body.
    pub fn render(&self) -> String {
        let mut body = String::new();
        body.push_str(&self.identity.marker());
        body.push('\n');
        body.push_str(&format!("## {}\n\n", self.title));

        if self.has_changes {
            let fence = fence_for(&self.text);
            body.push_str(&format!("{}sql\n{}\n{}\n", fence, self.text, fence));
        } else {
            body.push_str(NO_CHANGES_TEXT);
            body.push('\n');
        }

        body.push_str(&format!(
            "\n<sub>Generated by `{}` from `{}`. Posted by sqlpreview and updated on every run.</sub>\n",
            self.engine, self.schema_file
        ));
        body
    }
}

/// A code fence longer than any backtick run in `text`.
fn fence_for(text: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

/// Why a comment was not posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The run was not triggered by a change request.
    NotChangeRequest,
    /// No token was configured.
    NoCredential,
}

/// What the publisher did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new comment was created.
    Created(u64),
    /// An existing comment was edited.
    Updated(u64),
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// The platform refused the write.
    PermissionDenied,
}

/// Creates or updates the preview comment on the current change request.
pub struct CommentPublisher {
    target: Option<ChangeRequest>,
    platform: Option<Box<dyn ReviewPlatform>>,
    author: Option<String>,
}

impl CommentPublisher {
    /// Create a publisher.
    ///
    /// `target` is `None` outside a change request; `platform` is `None`
    /// when no posting credential is configured.
    pub fn new(target: Option<ChangeRequest>, platform: Option<Box<dyn ReviewPlatform>>) -> Self {
        Self {
            target,
            platform,
            author: Some(DEFAULT_COMMENT_AUTHOR.to_string()),
        }
    }

    /// Publisher that never posts.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Only consider comments by `author`; an empty author matches anyone.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        self.author = if author.is_empty() { None } else { Some(author) };
        self
    }

    /// Change request comments go to, if any.
    pub fn target(&self) -> Option<&ChangeRequest> {
        self.target.as_ref()
    }

    /// Create or update the comment.
    pub async fn publish(&self, comment: &PreviewComment) -> PreviewResult<PublishOutcome> {
        let Some(target) = &self.target else {
            info!("not running for a change request, skipping comment");
            return Ok(PublishOutcome::Skipped(SkipReason::NotChangeRequest));
        };
        let Some(platform) = &self.platform else {
            info!("no token configured, skipping comment");
            return Ok(PublishOutcome::Skipped(SkipReason::NoCredential));
        };

        let body = comment.render();
        let marker = comment.identity.marker();

        let result: PreviewResult<PublishOutcome> = async {
            let comments = platform.list_comments(target).await?;
            let existing = comments.iter().rev().find(|c| {
                self.author.as_deref().is_none_or(|a| c.author == a) && c.body.contains(&marker)
            });
            match existing {
                Some(found) => {
                    let updated = platform.update_comment(target, found.id, &body).await?;
                    info!(id = updated.id, number = target.number, "updated preview comment");
                    Ok(PublishOutcome::Updated(updated.id))
                }
                None => {
                    let created = platform.create_comment(target, &body).await?;
                    info!(id = created.id, number = target.number, "created preview comment");
                    Ok(PublishOutcome::Created(created.id))
                }
            }
        }
        .await;

        match result {
            Err(err) if err.is_tolerated() => {
                warn!(error = %err, "cannot post preview comment, the token lacks write access");
                Ok(PublishOutcome::PermissionDenied)
            }
            other => other,
        }
    }
}
