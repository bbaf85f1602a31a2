//! Engine process execution.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::command::{CommandConfig, merge_env};
use crate::error::PreviewResult;
use crate::secret::MASK;

/// Exit status and combined output of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Process exit code (`-1` when terminated by a signal).
    pub status: i32,
    /// Standard output followed by standard error.
    pub output: String,
}

impl RunResult {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs an engine executable.
///
/// A non-zero exit is reported in [`RunResult::status`], never as an error.
/// Errors are reserved for failing to start the process at all.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `executable` with the arguments and environment of `config`.
    async fn run(&self, executable: &Path, config: &CommandConfig) -> PreviewResult<RunResult>;
}

/// Executor that spawns a child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ProcessRunner {
    async fn run(&self, executable: &Path, config: &CommandConfig) -> PreviewResult<RunResult> {
        debug!(
            command = %command_line(executable, &redact_args(config.args(), config.password_flag())),
            env = ?config.env().keys().collect::<Vec<_>>(),
            "running engine"
        );

        // Non-UTF-8 variables are still inherited by the child; they just
        // cannot be overridden by the overlay.
        let ambient = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        let env = merge_env(ambient, config.env());

        let output = Command::new(executable)
            .args(config.args())
            .envs(&env)
            .kill_on_drop(true)
            .output()
            .await?;

        let status = output.status.code().unwrap_or(-1);
        let result = RunResult {
            status,
            output: combine_output(&output.stdout, &output.stderr),
        };
        debug!(status, bytes = result.output.len(), "engine finished");
        Ok(result)
    }
}

/// Replace the value following `password_flag` with a fixed mask.
pub fn redact_args(args: &[String], password_flag: Option<&str>) -> Vec<String> {
    let Some(flag) = password_flag else {
        return args.to_vec();
    };
    let mut redacted = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            redacted.push(MASK.to_string());
            mask_next = false;
        } else {
            mask_next = arg == flag;
            redacted.push(arg.clone());
        }
    }
    redacted
}

fn command_line(executable: &Path, args: &[String]) -> String {
    let mut line = executable.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&String::from_utf8_lossy(stderr));
    }
    combined
}
