//! `sqlpreview preview` command - Plan a schema change and publish it.

use std::path::PathBuf;

use sqlpreview_engine::{
    ActionsMasker, ApplyMode, BaselineStatus, CommentPublisher, ConnectionParams, DatabaseKind,
    DEFAULT_RELEASE_BASE_URL, GitHubClient, GitRevisions, NoopMasker, PreviewError,
    PreviewOrchestrator, PreviewOutcome, PreviewRequest, ProcessRunner, PublishOutcome,
    ReviewPlatform, SecretMasker, SkipReason, ToolResolver, ToolVersion, TriggerEvent,
};

use crate::cli::PreviewArgs;
use crate::config::Config;
use crate::context::{ActionsContext, PullRequestContext, write_step_outputs};
use crate::error::CliResult;
use crate::output::{self, kv};

/// Everything a run needs, after flags, config file and defaults are merged.
#[derive(Debug, Clone)]
pub struct PreviewSettings {
    /// Orchestrator input
    pub request: PreviewRequest,
    /// Engine release download root
    pub release_base_url: String,
    /// Whether to post a comment at all
    pub comments_enabled: bool,
    /// Author filter for existing comments
    pub comment_author: Option<String>,
    /// Token for the comment API
    pub github_token: Option<String>,
}

/// Merge flags over the config file over defaults.
pub fn resolve_settings(
    args: &PreviewArgs,
    config: &Config,
    pull_request: Option<&PullRequestContext>,
) -> CliResult<PreviewSettings> {
    let kind: DatabaseKind = text(&args.kind)
        .or_else(|| config.database.kind.clone())
        .ok_or(PreviewError::MissingParameter("kind"))?
        .parse()?;

    let schema_file = path(&args.schema_file)
        .or_else(|| config.database.schema_file.clone())
        .ok_or(PreviewError::MissingParameter("schema_file"))?;

    let version = ToolVersion::parse(
        &text(&args.engine_version)
            .or_else(|| config.engine.version.clone())
            .unwrap_or_default(),
    );

    let port = text(&args.port).or_else(|| config.database.port.map(|p| p.to_string()));
    let engine_config = path(&args.engine_config)
        .or_else(|| config.engine.config.clone())
        .map(|p| p.to_string_lossy().into_owned());
    let entries = [
        ("host", text(&args.host).or_else(|| config.database.host.clone())),
        ("port", port),
        ("user", text(&args.user).or_else(|| config.database.user.clone())),
        ("password", text(&args.password)),
        ("database", text(&args.database).or_else(|| config.database.name.clone())),
        ("config", engine_config),
    ];
    let params = ConnectionParams::from_map(
        entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v))),
    )?;

    let mode = if args.apply || config.engine.apply {
        ApplyMode::Apply
    } else {
        ApplyMode::DryRun
    };

    let mut request = PreviewRequest::new(kind, schema_file)
        .version(version)
        .params(params)
        .mode(mode)
        .event(
            pull_request
                .map(PullRequestContext::trigger_event)
                .unwrap_or(TriggerEvent::Other),
        );
    if let Some(baseline) =
        path(&args.baseline_file).or_else(|| config.database.baseline_file.clone())
    {
        request = request.baseline_file(baseline);
    }
    if let Some(title) = text(&args.title).or_else(|| config.comment.title.clone()) {
        request = request.title(title);
    }

    Ok(PreviewSettings {
        request,
        release_base_url: text(&args.release_base_url)
            .or_else(|| config.engine.release_base_url.clone())
            .unwrap_or_else(|| DEFAULT_RELEASE_BASE_URL.to_string()),
        comments_enabled: !args.no_comment && config.comment.enabled,
        comment_author: args
            .comment_author
            .clone()
            .or_else(|| config.comment.author.clone()),
        github_token: text(&args.github_token),
    })
}

fn text(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

fn path(value: &Option<PathBuf>) -> Option<PathBuf> {
    value.clone().filter(|p| !p.as_os_str().is_empty())
}

/// Run the preview command
pub async fn run(args: PreviewArgs) -> CliResult<()> {
    let cwd = std::env::current_dir()?;
    let (config, config_path) = Config::discover(args.config_file.as_deref(), &cwd)?;
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }

    let context = ActionsContext::from_env();
    let pull_request = context.pull_request()?;
    let settings = resolve_settings(&args, &config, pull_request.as_ref())?;

    let tools = ToolResolver::new()?.with_base_url(&settings.release_base_url);
    let revisions = GitRevisions::new(repo_dir(&args));
    let runner = ProcessRunner::new();
    let masker: Box<dyn SecretMasker> = if context.in_actions {
        Box::new(ActionsMasker)
    } else {
        Box::new(NoopMasker)
    };
    if let Some(token) = &settings.github_token {
        masker.mask(token);
    }
    let publisher = build_publisher(&settings, &context, pull_request.as_ref())?;

    let orchestrator =
        PreviewOrchestrator::new(&tools, &revisions, &runner, masker.as_ref(), &publisher);

    output::header("sqlpreview");
    kv("Database", settings.request.kind.as_str());
    kv("Schema", &settings.request.schema_file.display().to_string());
    kv("Engine version", &settings.request.version.to_string());
    kv("Mode", mode_label(settings.request.mode));
    if let Some(pr) = &pull_request {
        kv("Pull request", &format!("#{}", pr.target.number));
    }
    output::newline();

    let outcome = orchestrator.run(&settings.request).await?;
    report(&outcome, settings.comments_enabled);

    if let Some(path) = &context.output_path {
        write_step_outputs(path, outcome.has_changes, &outcome.output)?;
    }

    Ok(())
}

fn repo_dir(args: &PreviewArgs) -> PathBuf {
    if args.repo_dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        args.repo_dir.clone()
    }
}

fn build_publisher(
    settings: &PreviewSettings,
    context: &ActionsContext,
    pull_request: Option<&PullRequestContext>,
) -> CliResult<CommentPublisher> {
    if !settings.comments_enabled {
        return Ok(CommentPublisher::disabled());
    }

    let platform = match &settings.github_token {
        Some(token) => {
            let client = GitHubClient::new(token.clone())?.with_api_url(&context.api_url);
            Some(Box::new(client) as Box<dyn ReviewPlatform>)
        }
        None => None,
    };

    let mut publisher = CommentPublisher::new(pull_request.map(|pr| pr.target.clone()), platform);
    if let Some(author) = &settings.comment_author {
        publisher = publisher.with_author(author.clone());
    }
    Ok(publisher)
}

fn mode_label(mode: ApplyMode) -> &'static str {
    match mode {
        ApplyMode::DryRun => "plan (dry run)",
        ApplyMode::Apply => "apply",
    }
}

fn report(outcome: &PreviewOutcome, comments_enabled: bool) {
    kv("Engine", &outcome.engine);
    match outcome.baseline {
        BaselineStatus::Skipped => kv("Baseline", "none"),
        BaselineStatus::Absent => kv("Baseline", "schema file absent at base revision"),
        BaselineStatus::Applied => kv("Baseline", "applied"),
        BaselineStatus::Failed { status } => output::warn(&format!(
            "Baseline apply exited with status {}; continuing with the current schema",
            status
        )),
    }
    output::newline();

    if outcome.has_changes {
        output::section("DDL");
        output::code(&outcome.output);
    } else {
        output::success("No schema changes detected");
    }

    match outcome.comment {
        PublishOutcome::Created(id) => output::success(&format!("Created preview comment {}", id)),
        PublishOutcome::Updated(id) => output::success(&format!("Updated preview comment {}", id)),
        PublishOutcome::Skipped(_) if !comments_enabled => output::dim("Comments disabled"),
        PublishOutcome::Skipped(SkipReason::NotChangeRequest) => {
            output::dim("Not a pull request run, no comment posted")
        }
        PublishOutcome::Skipped(SkipReason::NoCredential) => {
            output::info("No GitHub token configured, comment skipped")
        }
        PublishOutcome::PermissionDenied => output::warn(
            "The token cannot comment on this pull request (forked repository?); comment skipped",
        ),
    }
}
