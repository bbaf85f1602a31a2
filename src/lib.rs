//! # sqlpreview
//!
//! Preview database schema migrations inside a code-review workflow.
//!
//! sqlpreview downloads the sqldef engine for the target database, replays
//! the schema at the pull request's base revision, plans the current schema
//! against a live database and posts the resulting DDL as one comment that
//! is updated on every run.
//!
//! The pipeline lives in [`sqlpreview_engine`]; the `sqlpreview` binary in
//! the `sqlpreview-cli` package wires it to GitHub Actions.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sqlpreview::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PreviewError> {
//!     let tools = ToolResolver::new()?;
//!     let revisions = GitRevisions::new(".");
//!     let runner = ProcessRunner::new();
//!     let publisher = CommentPublisher::disabled();
//!     let orchestrator =
//!         PreviewOrchestrator::new(&tools, &revisions, &runner, &NoopMasker, &publisher);
//!
//!     let request = PreviewRequest::new(DatabaseKind::Sqlite, "schema.sql")
//!         .params(ConnectionParams::new().database("app.db"));
//!     let outcome = orchestrator.run(&request).await?;
//!     println!("{}", outcome.output);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The preview engine.
pub mod engine {
    pub use sqlpreview_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use sqlpreview_engine::{
        ApplyMode, CommentPublisher, ConnectionParams, DatabaseKind, GitRevisions, NoopMasker,
        PreviewError, PreviewOrchestrator, PreviewOutcome, PreviewRequest, PreviewResult,
        ProcessRunner, ToolResolver, ToolVersion, TriggerEvent,
    };
}

// Re-export key types at the crate root
pub use sqlpreview_engine::{PreviewError, PreviewResult};
