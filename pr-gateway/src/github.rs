//! GitHub REST client for pull-request diffs and issue comments.
//!
//! Endpoints used:
//! - GET  /repos/{owner}/{repo}/pulls/{number}            (reads `diff_url`)
//! - GET  {diff_url}                                      (unified diff text)
//! - POST /repos/{owner}/{repo}/issues/{number}/comments  (PR conversation comment)

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, header};
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, GatewayError, GatewayResult, ProviderError};
use crate::types::{CommentBody, CommentReceipt, GatewayConfig, PullRequestId, PullRequestMeta};

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GitHubClient {
    /// Builds a client with a shared reqwest instance and auth token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api: base_api.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Validates `cfg` and builds the underlying HTTP client.
    pub fn from_config(cfg: GatewayConfig) -> GatewayResult<Self> {
        if cfg.token.trim().is_empty() {
            return Err(ConfigError::MissingToken.into());
        }
        let base = cfg.base_api.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(cfg.base_api).into());
        }
        let http = Client::builder()
            .user_agent("pr-prompt-selector/0.1")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self::new(http, base.to_string(), cfg.token))
    }

    fn repo_url(&self, id: &PullRequestId) -> String {
        format!(
            "{}/repos/{}/{}",
            self.base_api,
            urlencoding::encode(&id.owner),
            urlencoding::encode(&id.repo)
        )
    }

    fn auth(&self) -> String {
        format!("token {}", self.token)
    }

    /// Fetches the unified diff of a pull request.
    ///
    /// Reads the PR metadata first and then downloads the body of its `diff_url`.
    /// A PR without `diff_url` is reported as `InvalidResponse`.
    pub async fn fetch_pr_diff(&self, id: &PullRequestId) -> GatewayResult<String> {
        validate_id(id)?;
        let url = format!("{}/pulls/{}", self.repo_url(id), id.number);
        debug!(pr = id.number, %url, "github: fetch PR metadata");

        let meta: PullRequestMeta = check_status(
            self.http
                .get(&url)
                .header(header::AUTHORIZATION, self.auth())
                .header(header::ACCEPT, "application/vnd.github+json")
                .send()
                .await?,
        )?
        .json()
        .await?;

        let diff_url = meta
            .diff_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!("PR #{} has no diff_url", id.number))
            })?;

        debug!(pr = id.number, %diff_url, "github: download diff");
        let diff = check_status(
            self.http
                .get(&diff_url)
                .header(header::AUTHORIZATION, self.auth())
                .send()
                .await?,
        )?
        .text()
        .await?;

        info!(pr = id.number, bytes = diff.len(), "github: diff fetched");
        Ok(diff)
    }

    /// Posts `body` as a conversation comment on the pull request.
    ///
    /// Only 200 and 201 count as success.
    pub async fn post_review_comment(
        &self,
        id: &PullRequestId,
        body: &str,
    ) -> GatewayResult<CommentReceipt> {
        validate_id(id)?;
        if body.trim().is_empty() {
            return Err(GatewayError::Validation("comment body is empty".into()));
        }
        let url = format!("{}/issues/{}/comments", self.repo_url(id), id.number);

        let resp = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, self.auth())
            .header(header::ACCEPT, "application/vnd.github+json")
            .json(&CommentBody { body })
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let retry_after = retry_after_secs(&resp);
            let text = resp.text().await.unwrap_or_default();
            warn!(
                pr = id.number,
                status = status.as_u16(),
                body = %text.chars().take(240).collect::<String>(),
                "github: comment post failed"
            );
            return Err(ProviderError::from_status(status.as_u16(), retry_after).into());
        }

        let receipt: CommentReceipt = resp.json().await?;
        info!(pr = id.number, comment_id = receipt.id, "github: comment posted");
        Ok(receipt)
    }
}

fn validate_id(id: &PullRequestId) -> GatewayResult<()> {
    if id.owner.trim().is_empty() {
        return Err(ConfigError::MissingRepo("owner").into());
    }
    if id.repo.trim().is_empty() {
        return Err(ConfigError::MissingRepo("repo").into());
    }
    if id.number == 0 {
        return Err(GatewayError::Validation("PR number must be positive".into()));
    }
    Ok(())
}

/// Turns a non-success response into a [`ProviderError`], keeping `Retry-After`.
fn check_status(resp: Response) -> GatewayResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(ProviderError::from_status(status.as_u16(), retry_after_secs(&resp)).into())
}

fn retry_after_secs(resp: &Response) -> Option<u64> {
    resp.headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
