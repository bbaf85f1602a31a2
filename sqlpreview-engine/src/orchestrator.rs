//! The preview pipeline.
//!
//! One run resolves the engine, optionally replays a baseline schema, runs
//! the current schema against the database, interprets the output and
//! publishes the result:
//!
//! ```text
//! resolve tool -> [apply baseline] -> apply/plan current -> interpret -> publish
//! ```
//!
//! Only the final step's exit status is fatal. A failing baseline replay is
//! logged as a warning because the target database may not contain the
//! baseline objects yet.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::baseline::{BaselineResolver, RevisionSource};
use crate::command::{ApplyMode, CommandConfig, CommandConfigBuilder, ConnectionParams};
use crate::comment::{CommentIdentity, CommentPublisher, DEFAULT_TITLE, PreviewComment, PublishOutcome};
use crate::error::{PreviewError, PreviewResult};
use crate::kind::{DatabaseKind, is_no_change_output};
use crate::runner::Executor;
use crate::secret::SecretMasker;
use crate::tool::{ResolvedTool, ToolSource, ToolVersion};

/// What triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TriggerEvent {
    /// A change request, compared against its base revision.
    ChangeRequest {
        /// Revision the change request is based on.
        base_revision: String,
    },
    /// Any other event.
    #[default]
    Other,
}

/// Where the baseline schema comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineSource {
    /// A file supplied by the caller, used verbatim.
    Explicit(PathBuf),
    /// The schema file as of a revision.
    Revision(String),
    /// No baseline; the current schema is applied or planned directly.
    None,
}

impl BaselineSource {
    /// Pick the baseline for `event`. An explicit file always wins.
    pub fn determine(event: &TriggerEvent, explicit: Option<&Path>) -> Self {
        match (explicit, event) {
            (Some(path), _) => BaselineSource::Explicit(path.to_path_buf()),
            (None, TriggerEvent::ChangeRequest { base_revision }) => {
                BaselineSource::Revision(base_revision.clone())
            }
            (None, TriggerEvent::Other) => BaselineSource::None,
        }
    }
}

/// Inputs of one preview run.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    /// Database kind.
    pub kind: DatabaseKind,
    /// Engine version to download.
    pub version: ToolVersion,
    /// Connection parameters.
    pub params: ConnectionParams,
    /// Desired schema file.
    pub schema_file: PathBuf,
    /// Baseline file overriding the revision lookup.
    pub baseline_file: Option<PathBuf>,
    /// Whether the current schema is planned or applied.
    pub mode: ApplyMode,
    /// Triggering event.
    pub event: TriggerEvent,
    /// Fixed comment title. When set, the comment identity follows the
    /// title instead of the kind and schema path.
    pub title: Option<String>,
}

impl PreviewRequest {
    /// Plan `schema_file` against a `kind` database with default settings.
    pub fn new(kind: DatabaseKind, schema_file: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            version: ToolVersion::Latest,
            params: ConnectionParams::new(),
            schema_file: schema_file.into(),
            baseline_file: None,
            mode: ApplyMode::DryRun,
            event: TriggerEvent::Other,
            title: None,
        }
    }

    /// Set the engine version.
    pub fn version(mut self, version: ToolVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the connection parameters.
    pub fn params(mut self, params: ConnectionParams) -> Self {
        self.params = params;
        self
    }

    /// Use an explicit baseline file.
    pub fn baseline_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.baseline_file = Some(path.into());
        self
    }

    /// Set the apply mode of the current schema step.
    pub fn mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the triggering event.
    pub fn event(mut self, event: TriggerEvent) -> Self {
        self.event = event;
        self
    }

    /// Use a fixed comment title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = if title.trim().is_empty() { None } else { Some(title) };
        self
    }

    fn identity(&self) -> CommentIdentity {
        match &self.title {
            Some(title) => CommentIdentity::for_title(title),
            None => CommentIdentity::for_schema(self.kind, &self.schema_file),
        }
    }
}

/// How the baseline step went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineStatus {
    /// No baseline was requested.
    Skipped,
    /// The schema file did not exist at the base revision.
    Absent,
    /// The baseline was replayed successfully.
    Applied,
    /// The baseline replay exited non-zero; the run continued.
    Failed {
        /// Engine exit status.
        status: i32,
    },
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOutcome {
    /// Whether the engine reported anything to apply.
    pub has_changes: bool,
    /// Trimmed engine output.
    pub output: String,
    /// Engine name and version.
    pub engine: String,
    /// Baseline step result.
    pub baseline: BaselineStatus,
    /// Comment result.
    pub comment: PublishOutcome,
}

/// Sequences tool resolution, baseline replay, the current schema step and
/// comment publication.
pub struct PreviewOrchestrator<'a> {
    tools: &'a dyn ToolSource,
    revisions: &'a dyn RevisionSource,
    executor: &'a dyn Executor,
    masker: &'a dyn SecretMasker,
    publisher: &'a CommentPublisher,
}

impl<'a> PreviewOrchestrator<'a> {
    /// Wire the pipeline together.
    pub fn new(
        tools: &'a dyn ToolSource,
        revisions: &'a dyn RevisionSource,
        executor: &'a dyn Executor,
        masker: &'a dyn SecretMasker,
        publisher: &'a CommentPublisher,
    ) -> Self {
        Self {
            tools,
            revisions,
            executor,
            masker,
            publisher,
        }
    }

    /// Run the pipeline once.
    pub async fn run(&self, request: &PreviewRequest) -> PreviewResult<PreviewOutcome> {
        // Configuration errors surface before anything is downloaded. The
        // baseline invocation is derived from this one.
        let current = CommandConfigBuilder::new(self.masker).build(
            request.kind,
            &request.params,
            request.mode,
            &request.schema_file,
        )?;

        let tool = self.tools.resolve(request.kind, &request.version).await?;
        info!(engine = tool.label(), path = %tool.executable().display(), "engine ready");

        let source = BaselineSource::determine(&request.event, request.baseline_file.as_deref());
        let replayed = match source {
            BaselineSource::None => {
                info!("no baseline, running the current schema directly");
                Ok(BaselineStatus::Skipped)
            }
            BaselineSource::Explicit(path) => {
                self.apply_baseline(&tool, &current.for_baseline(&path))
                    .await
            }
            BaselineSource::Revision(revision) => {
                self.baseline_from_revision(&current, request, &tool, &revision)
                    .await
            }
        };
        let baseline = match replayed {
            Ok(status) => status,
            Err(err) if err.is_tolerated() => {
                warn!(error = %err, "baseline apply failed, continuing with the current schema");
                BaselineStatus::Failed {
                    status: err.exit_status().unwrap_or(-1),
                }
            }
            Err(err) => return Err(err),
        };

        let result = self.executor.run(tool.executable(), &current).await?;
        if !result.success() {
            return Err(PreviewError::PlanOrApplyFailed {
                status: result.status,
                output: result.output.trim().to_string(),
            });
        }

        let output = result.output.trim().to_string();
        let has_changes = !is_no_change_output(&output);
        info!(has_changes, "schema step finished");

        let comment = PreviewComment {
            identity: request.identity(),
            title: request
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            engine: tool.label().to_string(),
            schema_file: request.schema_file.display().to_string(),
            has_changes,
            text: output.clone(),
        };
        let comment = self.publisher.publish(&comment).await?;

        Ok(PreviewOutcome {
            has_changes,
            output,
            engine: tool.label().to_string(),
            baseline,
            comment,
        })
    }

    async fn baseline_from_revision(
        &self,
        current: &CommandConfig,
        request: &PreviewRequest,
        tool: &ResolvedTool,
        revision: &str,
    ) -> PreviewResult<BaselineStatus> {
        let resolver = BaselineResolver::new(self.revisions)?;
        let artifact = resolver.resolve(revision, &request.schema_file).await?;

        // The artifact and its scratch directory are removed when they go
        // out of scope, on success and error alike.
        let Some(path) = artifact.path() else {
            info!(revision, "schema file absent at base revision, skipping baseline");
            return Ok(BaselineStatus::Absent);
        };

        self.apply_baseline(tool, &current.for_baseline(path)).await
    }

    async fn apply_baseline(
        &self,
        tool: &ResolvedTool,
        config: &CommandConfig,
    ) -> PreviewResult<BaselineStatus> {
        info!(file = config.schema_file(), "applying baseline");
        let result = self.executor.run(tool.executable(), config).await?;
        if !result.success() {
            return Err(PreviewError::BaselineApplyFailed {
                status: result.status,
                output: result.output.trim().to_string(),
            });
        }
        Ok(BaselineStatus::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{ChangeRequest, SkipReason};
    use crate::secret::{NoopMasker, RecordingMasker};
    use crate::testing::{FakePlatform, FakeTools, MapRevisions, ScriptedExecutor};
    use pretty_assertions::assert_eq;

    const ALTER: &str = "-- dry run --\nALTER TABLE `users` ADD COLUMN `email` text;\n";

    fn request() -> PreviewRequest {
        PreviewRequest::new(DatabaseKind::Mysql, "db/schema.sql")
            .params(ConnectionParams::new().database("app"))
    }

    fn pull_request() -> TriggerEvent {
        TriggerEvent::ChangeRequest {
            base_revision: "base123".to_string(),
        }
    }

    fn revisions() -> MapRevisions {
        MapRevisions::new().with(
            "base123",
            "db/schema.sql",
            "CREATE TABLE users (id int, username text);\n",
        )
    }

    #[test]
    fn test_baseline_source_selection() {
        let explicit = Path::new("old.sql");
        assert_eq!(
            BaselineSource::determine(&pull_request(), Some(explicit)),
            BaselineSource::Explicit(PathBuf::from("old.sql"))
        );
        assert_eq!(
            BaselineSource::determine(&TriggerEvent::Other, Some(explicit)),
            BaselineSource::Explicit(PathBuf::from("old.sql"))
        );
        assert_eq!(
            BaselineSource::determine(&pull_request(), None),
            BaselineSource::Revision("base123".to_string())
        );
        assert_eq!(
            BaselineSource::determine(&TriggerEvent::Other, None),
            BaselineSource::None
        );
    }

    #[tokio::test]
    async fn test_direct_run_without_baseline() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new().respond(0, ALTER);
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let outcome = orchestrator.run(&request()).await.unwrap();

        assert!(outcome.has_changes);
        assert_eq!(outcome.output, ALTER.trim());
        assert_eq!(outcome.baseline, BaselineStatus::Skipped);
        assert_eq!(outcome.engine, "mysqldef latest");
        assert_eq!(revisions.calls(), 0);

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].executable, PathBuf::from("/opt/engines/mysqldef"));
        assert!(calls[0].args.contains(&"--dry-run".to_string()));
        assert_eq!(calls[0].schema_file, PathBuf::from("db/schema.sql"));
    }

    #[tokio::test]
    async fn test_baseline_precedes_current_and_is_removed() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new().respond(0, "").respond(0, ALTER);
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let outcome = orchestrator
            .run(&request().event(pull_request()))
            .await
            .unwrap();

        assert_eq!(outcome.baseline, BaselineStatus::Applied);
        assert!(outcome.has_changes);

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);

        let baseline = &calls[0];
        assert!(!baseline.args.contains(&"--dry-run".to_string()));
        assert_eq!(
            baseline.schema_content.as_deref(),
            Some("CREATE TABLE users (id int, username text);\n")
        );
        assert!(!baseline.schema_file.exists());

        let current = &calls[1];
        assert!(current.args.contains(&"--dry-run".to_string()));
        assert_eq!(current.schema_file, PathBuf::from("db/schema.sql"));
        assert_eq!(baseline.env, current.env);
        assert_eq!(baseline.args.last(), current.args.last());
    }

    #[tokio::test]
    async fn test_baseline_is_the_current_invocation_with_another_file() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new();
        let masker = RecordingMasker::new();
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &masker, &publisher);

        let request = request()
            .params(
                ConnectionParams::new()
                    .host("db.internal")
                    .user("app")
                    .password("s3cret")
                    .database("app"),
            )
            .event(pull_request());
        orchestrator.run(&request).await.unwrap();

        let calls = executor.calls();
        let (baseline, current) = (&calls[0], &calls[1]);
        let baseline_file = baseline.schema_file.to_string_lossy().into_owned();
        let expected: Vec<String> = current
            .args
            .iter()
            .filter(|a| a.as_str() != "--dry-run")
            .map(|a| {
                if a == "db/schema.sql" {
                    baseline_file.clone()
                } else {
                    a.clone()
                }
            })
            .collect();

        assert_eq!(baseline.args, expected);
        assert_eq!(baseline.env, current.env);
        assert_eq!(masker.masked(), vec!["s3cret"]);
    }

    #[tokio::test]
    async fn test_baseline_failure_is_tolerated() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new()
            .respond(1, "ERROR 1146: Table 'app.users' doesn't exist")
            .respond(0, ALTER);
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let outcome = orchestrator
            .run(&request().event(pull_request()))
            .await
            .unwrap();

        assert_eq!(outcome.baseline, BaselineStatus::Failed { status: 1 });
        assert!(outcome.has_changes);
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_current_failure_is_fatal_and_posts_nothing() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new()
            .respond(0, "")
            .respond(2, "  syntax error near 'CREAT'\n");
        let platform = FakePlatform::new();
        let publisher = CommentPublisher::new(
            Some(ChangeRequest {
                owner: "acme".to_string(),
                repo: "shop".to_string(),
                number: 7,
            }),
            Some(Box::new(platform.clone())),
        );
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let err = orchestrator
            .run(&request().event(pull_request()))
            .await
            .unwrap_err();

        match err {
            PreviewError::PlanOrApplyFailed { status, output } => {
                assert_eq!(status, 2);
                assert_eq!(output, "syntax error near 'CREAT'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(platform.calls(), 0);
        assert!(!executor.calls()[0].schema_file.exists());
    }

    #[tokio::test]
    async fn test_absent_baseline_skips_apply() {
        let tools = FakeTools::new();
        let revisions = MapRevisions::new();
        let executor = ScriptedExecutor::new().respond(0, ALTER);
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let outcome = orchestrator
            .run(&request().event(pull_request()))
            .await
            .unwrap();

        assert_eq!(outcome.baseline, BaselineStatus::Absent);
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(revisions.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_baseline_is_applied() {
        let tools = FakeTools::new();
        let revisions = MapRevisions::new().with("base123", "db/schema.sql", "");
        let executor = ScriptedExecutor::new();
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let outcome = orchestrator
            .run(&request().event(pull_request()))
            .await
            .unwrap();

        assert_eq!(outcome.baseline, BaselineStatus::Applied);
        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].schema_content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_explicit_baseline_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.sql");
        std::fs::write(&old, "CREATE TABLE legacy (id int);\n").unwrap();

        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new();
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        orchestrator
            .run(&request().event(pull_request()).baseline_file(&old))
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].schema_file, old);
        assert!(old.exists());
        assert_eq!(revisions.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_change_sentinel() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new()
            .respond(0, "\n-- Nothing is modified --\n")
            .respond(0, "-- Nothing is modified --");
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let first = orchestrator.run(&request()).await.unwrap();
        let second = orchestrator.run(&request()).await.unwrap();

        assert!(!first.has_changes);
        assert!(!second.has_changes);
        assert_eq!(first.output, "-- Nothing is modified --");
    }

    #[tokio::test]
    async fn test_configuration_error_before_download() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new();
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let err = orchestrator
            .run(&PreviewRequest::new(DatabaseKind::Postgresql, "schema.sql"))
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::MissingParameter("database")));
        assert_eq!(tools.calls(), 0);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_runs_nothing() {
        let tools = FakeTools::failing();
        let revisions = revisions();
        let executor = ScriptedExecutor::new();
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let err = orchestrator
            .run(&request().event(pull_request()))
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::DownloadFailed { .. }));
        assert!(executor.calls().is_empty());
        assert_eq!(revisions.calls(), 0);
    }

    #[tokio::test]
    async fn test_baseline_read_failure_is_fatal() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new();
        let publisher = CommentPublisher::disabled();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let event = TriggerEvent::ChangeRequest {
            base_revision: "broken".to_string(),
        };
        let err = orchestrator
            .run(&request().event(event))
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::BaselineReadFailure { .. }));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_comment_published_once_per_identity() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new().respond(0, ALTER).respond(0, ALTER);
        let platform = FakePlatform::new();
        let publisher = CommentPublisher::new(
            Some(ChangeRequest {
                owner: "acme".to_string(),
                repo: "shop".to_string(),
                number: 7,
            }),
            Some(Box::new(platform.clone())),
        );
        let masker = RecordingMasker::new();
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &masker, &publisher);
        let request = request()
            .params(ConnectionParams::new().password("s3cret").database("app"))
            .title("Staging");

        let first = orchestrator.run(&request).await.unwrap();
        let second = orchestrator.run(&request).await.unwrap();

        let PublishOutcome::Created(id) = first.comment else {
            panic!("expected create, got {:?}", first.comment);
        };
        assert_eq!(second.comment, PublishOutcome::Updated(id));

        let comments = platform.comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.contains("<!-- sqlpreview:v1:title:Staging -->"));
        assert!(comments[0].body.contains("## Staging"));
        assert!(comments[0].body.contains("ADD COLUMN `email`"));
        assert!(masker.masked().contains(&"s3cret".to_string()));
    }

    #[tokio::test]
    async fn test_outcome_reports_skipped_comment() {
        let tools = FakeTools::new();
        let revisions = revisions();
        let executor = ScriptedExecutor::new();
        let publisher = CommentPublisher::new(None, Some(Box::new(FakePlatform::new())));
        let orchestrator =
            PreviewOrchestrator::new(&tools, &revisions, &executor, &NoopMasker, &publisher);

        let outcome = orchestrator.run(&request()).await.unwrap();

        assert_eq!(
            outcome.comment,
            PublishOutcome::Skipped(SkipReason::NotChangeRequest)
        );
    }
}
