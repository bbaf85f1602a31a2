//! Error types for the preview engine.

use thiserror::Error;

/// Result type alias for preview operations.
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Errors that can occur while previewing a migration.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// No engine artifact is published for the host platform.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system label as reported by the host.
        os: String,
        /// CPU architecture label as reported by the host.
        arch: String,
    },

    /// The requested database kind is not one of the supported engines.
    #[error("Unsupported database kind '{0}' (expected mysql, postgresql, sqlite or mssql)")]
    UnsupportedDatabaseKind(String),

    /// The engine archive could not be fetched or unpacked.
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// URL that was requested.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The archive was unpacked but did not contain the engine binary.
    #[error("Binary '{binary}' not found in extracted archive at {root}")]
    BinaryNotFound {
        /// Expected executable name.
        binary: String,
        /// Extraction root that was searched.
        root: String,
    },

    /// A required connection parameter was not supplied.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// A connection parameter had an unusable value.
    #[error("Invalid value for parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// Replaying the baseline schema exited non-zero.
    #[error("Baseline apply exited with status {status}: {output}")]
    BaselineApplyFailed {
        /// Engine exit status.
        status: i32,
        /// Combined engine output.
        output: String,
    },

    /// The final plan/apply step exited non-zero.
    #[error("Schema plan/apply exited with status {status}: {output}")]
    PlanOrApplyFailed {
        /// Engine exit status.
        status: i32,
        /// Combined engine output.
        output: String,
    },

    /// Reading the schema file at a prior revision failed for a reason other than absence.
    #[error("Failed to read {path} at revision {revision}: {reason}")]
    BaselineReadFailure {
        /// Revision that was requested.
        revision: String,
        /// Path that was requested.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The token may not write comments on the change request.
    #[error("Permission denied while posting comment: {0}")]
    CommentPermissionDenied(String),

    /// Any other failure talking to the comment API.
    #[error("Comment API error: {0}")]
    CommentOtherFailure(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File system or process spawn error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PreviewError {
    /// Create a download failure.
    pub fn download(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a baseline read failure.
    pub fn baseline_read(
        revision: impl Into<String>,
        path: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::BaselineReadFailure {
            revision: revision.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a comment API failure.
    pub fn comment(msg: impl Into<String>) -> Self {
        Self::CommentOtherFailure(msg.into())
    }

    /// Engine exit status carried by the error, if any.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::BaselineApplyFailed { status, .. } | Self::PlanOrApplyFailed { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the pipeline downgrades this error to a warning.
    pub fn is_tolerated(&self) -> bool {
        matches!(
            self,
            Self::BaselineApplyFailed { .. } | Self::CommentPermissionDenied(_)
        )
    }
}
