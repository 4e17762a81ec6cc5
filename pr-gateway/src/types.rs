use serde::{Deserialize, Serialize};

/// Pull request coordinates on a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestId {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PullRequestId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }
}

/// What GitHub returns for a created issue comment (subset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentReceipt {
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Runtime configuration for [`crate::github::GitHubClient`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base, e.g. "https://api.github.com"
    pub base_api: String,
    /// Personal access or app token.
    pub token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub const DEFAULT_BASE_API: &'static str = "https://api.github.com";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_api: Self::DEFAULT_BASE_API.to_string(),
            token: token.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_base_api(mut self, base_api: impl Into<String>) -> Self {
        self.base_api = base_api.into();
        self
    }
}

/// `GET /repos/{o}/{r}/pulls/{n}` payload, only what we read.
#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestMeta {
    #[serde(default)]
    pub diff_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub body: &'a str,
}
