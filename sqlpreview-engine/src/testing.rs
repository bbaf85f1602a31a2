//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::baseline::RevisionSource;
use crate::comment::{ChangeRequest, ReviewComment, ReviewPlatform};
use crate::command::CommandConfig;
use crate::error::{PreviewError, PreviewResult};
use crate::kind::DatabaseKind;
use crate::runner::{Executor, RunResult};
use crate::tool::{ResolvedTool, ToolSource, ToolVersion};

#[derive(Default)]
struct PlatformState {
    comments: Vec<ReviewComment>,
    next_id: u64,
    calls: usize,
    deny_writes: bool,
    fail_listing: bool,
}

/// Comment store shared between clones.
#[derive(Clone, Default)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn deny_writes(self) -> Self {
        self.state.lock().unwrap().deny_writes = true;
        self
    }

    pub(crate) fn fail_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    pub(crate) fn seed(&self, author: &str, body: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.comments.push(ReviewComment {
            id,
            author: author.to_string(),
            body: body.to_string(),
        });
        id
    }

    pub(crate) fn comments(&self) -> Vec<ReviewComment> {
        self.state.lock().unwrap().comments.clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl ReviewPlatform for FakePlatform {
    async fn list_comments(&self, _target: &ChangeRequest) -> PreviewResult<Vec<ReviewComment>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_listing {
            return Err(PreviewError::comment("500 Internal Server Error"));
        }
        Ok(state.comments.clone())
    }

    async fn create_comment(&self, _target: &ChangeRequest, body: &str) -> PreviewResult<ReviewComment> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            if state.deny_writes {
                return Err(PreviewError::CommentPermissionDenied(
                    "Resource not accessible by integration".to_string(),
                ));
            }
        }
        let id = self.seed(crate::comment::DEFAULT_COMMENT_AUTHOR, body);
        Ok(ReviewComment {
            id,
            author: crate::comment::DEFAULT_COMMENT_AUTHOR.to_string(),
            body: body.to_string(),
        })
    }

    async fn update_comment(
        &self,
        _target: &ChangeRequest,
        id: u64,
        body: &str,
    ) -> PreviewResult<ReviewComment> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.deny_writes {
            return Err(PreviewError::CommentPermissionDenied(
                "Resource not accessible by integration".to_string(),
            ));
        }
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PreviewError::comment("404 Not Found"))?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }
}

/// Tool source returning a fixed path.
#[derive(Default)]
pub(crate) struct FakeTools {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeTools {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolSource for FakeTools {
    async fn resolve(&self, kind: DatabaseKind, version: &ToolVersion) -> PreviewResult<ResolvedTool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PreviewError::download("https://example.invalid", "connection refused"));
        }
        let binary = kind.profile().binary;
        Ok(ResolvedTool::at(
            PathBuf::from("/opt/engines").join(binary),
            format!("{} {}", binary, version),
        ))
    }
}

/// What the scripted executor saw on one call.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub(crate) executable: PathBuf,
    pub(crate) args: Vec<String>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) schema_file: PathBuf,
    pub(crate) schema_content: Option<String>,
}

/// Executor replaying canned results in order.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    responses: Mutex<VecDeque<RunResult>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, status: i32, output: &str) -> Self {
        self.responses.lock().unwrap().push_back(RunResult {
            status,
            output: output.to_string(),
        });
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(&self, executable: &Path, config: &CommandConfig) -> PreviewResult<RunResult> {
        let schema_file = PathBuf::from(config.schema_file());
        self.calls.lock().unwrap().push(RecordedCall {
            executable: executable.to_path_buf(),
            args: config.args().to_vec(),
            env: config.env().clone(),
            schema_content: std::fs::read_to_string(&schema_file).ok(),
            schema_file,
        });
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunResult {
                status: 0,
                output: "-- Nothing is modified --\n".to_string(),
            }))
    }
}

/// Revision store keyed by (revision, path).
#[derive(Default)]
pub(crate) struct MapRevisions {
    files: HashMap<(String, PathBuf), Vec<u8>>,
    calls: AtomicUsize,
}

impl MapRevisions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, revision: &str, path: &str, content: &str) -> Self {
        self.files.insert(
            (revision.to_string(), PathBuf::from(path)),
            content.as_bytes().to_vec(),
        );
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RevisionSource for MapRevisions {
    async fn read_at(&self, revision: &str, path: &Path) -> PreviewResult<Option<Vec<u8>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if revision == "broken" {
            return Err(PreviewError::baseline_read(
                revision,
                path.display().to_string(),
                "fatal: bad object",
            ));
        }
        Ok(self
            .files
            .get(&(revision.to_string(), path.to_path_buf()))
            .cloned())
    }
}
