//! GitHub Actions run context and step outputs.

use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use sqlpreview_engine::{ChangeRequest, DEFAULT_API_URL, TriggerEvent};

use crate::error::{CliError, CliResult};

/// Events that carry a pull request payload.
const PULL_REQUEST_EVENTS: &[&str] = &["pull_request", "pull_request_target"];

/// Values read from the Actions environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsContext {
    /// `GITHUB_EVENT_NAME`
    pub event_name: Option<String>,
    /// `GITHUB_EVENT_PATH`
    pub event_path: Option<PathBuf>,
    /// `GITHUB_REPOSITORY`, as `owner/repo`
    pub repository: Option<String>,
    /// `GITHUB_API_URL`
    pub api_url: String,
    /// `GITHUB_OUTPUT`
    pub output_path: Option<PathBuf>,
    /// `GITHUB_ACTIONS == "true"`
    pub in_actions: bool,
}

/// The pull request a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestContext {
    /// Where comments go.
    pub target: ChangeRequest,
    /// Base commit of the pull request.
    pub base_sha: String,
}

#[derive(Deserialize)]
struct EventPayload {
    #[serde(default)]
    pull_request: Option<PullRequestPayload>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    base: BaseRef,
}

#[derive(Deserialize)]
struct BaseRef {
    sha: String,
}

impl ActionsContext {
    /// Read the context from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the context through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            event_name: get("GITHUB_EVENT_NAME"),
            event_path: get("GITHUB_EVENT_PATH").map(PathBuf::from),
            repository: get("GITHUB_REPOSITORY"),
            api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            output_path: get("GITHUB_OUTPUT").map(PathBuf::from),
            in_actions: get("GITHUB_ACTIONS").is_some_and(|v| v == "true"),
        }
    }

    /// Whether the triggering event is a pull request event.
    pub fn is_pull_request_event(&self) -> bool {
        self.event_name
            .as_deref()
            .is_some_and(|name| PULL_REQUEST_EVENTS.contains(&name))
    }

    /// The pull request this run belongs to, if any.
    pub fn pull_request(&self) -> CliResult<Option<PullRequestContext>> {
        if !self.is_pull_request_event() {
            return Ok(None);
        }

        let event_path = self
            .event_path
            .as_ref()
            .ok_or_else(|| CliError::Event("GITHUB_EVENT_PATH is not set".to_string()))?;
        let payload: EventPayload = serde_json::from_str(&std::fs::read_to_string(event_path)?)?;
        let pull_request = payload.pull_request.ok_or_else(|| {
            CliError::Event("event payload has no pull_request object".to_string())
        })?;

        let repository = self
            .repository
            .as_deref()
            .ok_or_else(|| CliError::Event("GITHUB_REPOSITORY is not set".to_string()))?;
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
            .ok_or_else(|| CliError::Event(format!("invalid GITHUB_REPOSITORY '{}'", repository)))?;

        Ok(Some(PullRequestContext {
            target: ChangeRequest {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number: pull_request.number,
            },
            base_sha: pull_request.base.sha,
        }))
    }
}

impl PullRequestContext {
    /// Trigger event for the orchestrator.
    pub fn trigger_event(&self) -> TriggerEvent {
        TriggerEvent::ChangeRequest {
            base_revision: self.base_sha.clone(),
        }
    }
}

/// Append `has_changes` and `ddl` to the step output file.
pub fn write_step_outputs(path: &Path, has_changes: bool, ddl: &str) -> CliResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(format_step_outputs(has_changes, ddl).as_bytes())?;
    Ok(())
}

fn format_step_outputs(has_changes: bool, ddl: &str) -> String {
    let mut delimiter = "SQLPREVIEW_EOF".to_string();
    while ddl.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    format!(
        "has_changes={}\nddl<<{}\n{}\n{}\n",
        has_changes, delimiter, ddl, delimiter
    )
}
