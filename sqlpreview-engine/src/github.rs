//! GitHub REST implementation of [`ReviewPlatform`].

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comment::{ChangeRequest, ReviewComment, ReviewPlatform};
use crate::error::{PreviewError, PreviewResult};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PAGE_SIZE: usize = 100;
const API_VERSION: &str = "2022-11-28";

/// Issue-comment client authenticated with a token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    id: u64,
    #[serde(default)]
    user: Option<ApiUser>,
    #[serde(default)]
    body: Option<String>,
}

impl From<ApiComment> for ReviewComment {
    fn from(comment: ApiComment) -> Self {
        ReviewComment {
            id: comment.id,
            author: comment.user.map(|u| u.login).unwrap_or_default(),
            body: comment.body.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitHubClient {
    /// Create a client for the public API.
    pub fn new(token: impl Into<String>) -> PreviewResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sqlpreview/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
        })
    }

    /// Point the client at another API root, e.g. GitHub Enterprise.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn comments_path(target: &ChangeRequest) -> String {
        format!(
            "repos/{}/{}/issues/{}/comments",
            target.owner, target.repo, target.number
        )
    }
}

/// Map a non-success response to a comment error.
///
/// 403 always means the token lacks permission. GitHub answers 404 instead
/// of 403 for writes to repositories the token cannot see, so a 404 on a
/// write is treated the same way.
async fn check(response: Response, write: bool) -> PreviewResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|e| e.message)
        .unwrap_or(text);
    let reason = format!("{} {}", status, message.trim());

    if status == StatusCode::FORBIDDEN || (write && status == StatusCode::NOT_FOUND) {
        Err(PreviewError::CommentPermissionDenied(reason))
    } else {
        Err(PreviewError::comment(reason))
    }
}

#[async_trait]
impl ReviewPlatform for GitHubClient {
    async fn list_comments(&self, target: &ChangeRequest) -> PreviewResult<Vec<ReviewComment>> {
        let path = Self::comments_path(target);
        let mut comments = Vec::new();
        let mut page = 1usize;

        loop {
            let response = self
                .request(Method::GET, &path)
                .query(&[("per_page", PAGE_SIZE), ("page", page)])
                .send()
                .await?;
            let batch: Vec<ApiComment> = check(response, false).await?.json().await?;
            let len = batch.len();
            comments.extend(batch.into_iter().map(ReviewComment::from));
            debug!(page, len, "listed comments");

            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(comments)
    }

    async fn create_comment(&self, target: &ChangeRequest, body: &str) -> PreviewResult<ReviewComment> {
        let response = self
            .request(Method::POST, &Self::comments_path(target))
            .json(&CommentBody { body })
            .send()
            .await?;
        let created: ApiComment = check(response, true).await?.json().await?;
        Ok(created.into())
    }

    async fn update_comment(
        &self,
        target: &ChangeRequest,
        id: u64,
        body: &str,
    ) -> PreviewResult<ReviewComment> {
        let path = format!(
            "repos/{}/{}/issues/comments/{}",
            target.owner, target.repo, id
        );
        let response = self
            .request(Method::PATCH, &path)
            .json(&CommentBody { body })
            .send()
            .await?;
        let updated: ApiComment = check(response, true).await?.json().await?;
        Ok(updated.into())
    }
}
