//! # sqlpreview-engine
//!
//! Migration preview engine for code-review workflows.
//!
//! This crate provides functionality for:
//! - Downloading the schema diff engine (`mysqldef`, `psqldef`, `sqlite3def`,
//!   `mssqldef`) for the host platform
//! - Building per-database engine invocations, with secrets kept off the log
//! - Replaying the schema at a change request's base revision as a baseline
//! - Planning or applying the current schema and detecting "no changes"
//! - Publishing the result as a single, updatable review comment
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ ToolResolver │────▶│ ProcessRunner  │◀────│ CommandCfg  │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                              ▲                     ▲
//!                              │                     │
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ Orchestrator   │────▶│ Baseline    │
//!                      └────────────────┘     └─────────────┘
//!                              │
//!                              ▼
//!                      ┌────────────────┐
//!                      │ Comment        │
//!                      └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sqlpreview_engine::{
//!     ActionsMasker, CommentPublisher, ConnectionParams, DatabaseKind, GitRevisions,
//!     PreviewOrchestrator, PreviewRequest, ProcessRunner, ToolResolver, TriggerEvent,
//! };
//!
//! async fn preview() -> Result<(), Box<dyn std::error::Error>> {
//!     let tools = ToolResolver::new()?;
//!     let revisions = GitRevisions::new(".");
//!     let runner = ProcessRunner::new();
//!     let publisher = CommentPublisher::disabled();
//!     let orchestrator =
//!         PreviewOrchestrator::new(&tools, &revisions, &runner, &ActionsMasker, &publisher);
//!
//!     let request = PreviewRequest::new(DatabaseKind::Postgresql, "schema.sql")
//!         .params(ConnectionParams::new().user("postgres").database("app"))
//!         .event(TriggerEvent::ChangeRequest { base_revision: "origin/main".into() });
//!
//!     let outcome = orchestrator.run(&request).await?;
//!     println!("has changes: {}\n{}", outcome.has_changes, outcome.output);
//!     Ok(())
//! }
//! ```

pub mod baseline;
pub mod command;
pub mod comment;
pub mod error;
pub mod git;
pub mod github;
pub mod kind;
pub mod orchestrator;
pub mod runner;
pub mod secret;
pub mod tool;

#[cfg(test)]
mod testing;

// Re-exports
pub use baseline::{BaselineArtifact, BaselineResolver, RevisionSource};
pub use command::{
    merge_env, ApplyMode, CommandConfig, CommandConfigBuilder, ConnectionParams, CONFIG_FLAG,
    DRY_RUN_FLAG, FILE_FLAG,
};
pub use comment::{
    ChangeRequest, CommentIdentity, CommentPublisher, PreviewComment, PublishOutcome,
    ReviewComment, ReviewPlatform, SkipReason, DEFAULT_COMMENT_AUTHOR, DEFAULT_TITLE,
    MARKER_PREFIX, NO_CHANGES_TEXT,
};
pub use error::{PreviewError, PreviewResult};
pub use git::GitRevisions;
pub use github::{GitHubClient, DEFAULT_API_URL};
pub use kind::{is_no_change_output, DatabaseKind, EngineProfile, ServerFlags, NO_CHANGE_SENTINELS};
pub use orchestrator::{
    BaselineSource, BaselineStatus, PreviewOrchestrator, PreviewOutcome, PreviewRequest,
    TriggerEvent,
};
pub use runner::{redact_args, Executor, ProcessRunner, RunResult};
pub use secret::{ActionsMasker, NoopMasker, RecordingMasker, SecretMasker, MASK};
pub use tool::{
    extract_archive, ArchiveFormat, Platform, ResolvedTool, ToolResolver, ToolSource, ToolSpec,
    ToolVersion, DEFAULT_RELEASE_BASE_URL,
};
