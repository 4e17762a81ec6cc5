//! Where PR diffs come from and where reviews are posted.

use pr_gateway::{CommentReceipt, GitHubClient, PullRequestId};
use tracing::info;

use crate::config::GitHubSettings;
use crate::errors::SelectorResult;

#[allow(async_fn_in_trait)]
pub trait ReviewHost {
    async fn fetch_diff(&self, pr_number: u64) -> SelectorResult<String>;
    async fn post_comment(&self, pr_number: u64, body: &str) -> SelectorResult<CommentReceipt>;
}

/// [`ReviewHost`] for one GitHub repository.
#[derive(Debug, Clone)]
pub struct GitHubHost {
    client: GitHubClient,
    owner: String,
    repo: String,
}

impl GitHubHost {
    pub fn new(client: GitHubClient, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn from_settings(settings: &GitHubSettings) -> SelectorResult<Self> {
        let cfg = pr_gateway::GatewayConfig::new(settings.token.clone())
            .with_base_api(settings.api_url.clone());
        let client = GitHubClient::from_config(cfg)?;
        Ok(Self::new(client, settings.owner.clone(), settings.repo.clone()))
    }

    fn id(&self, pr_number: u64) -> PullRequestId {
        PullRequestId::new(self.owner.clone(), self.repo.clone(), pr_number)
    }
}

impl ReviewHost for GitHubHost {
    async fn fetch_diff(&self, pr_number: u64) -> SelectorResult<String> {
        let diff = self.client.fetch_pr_diff(&self.id(pr_number)).await?;
        info!(pr = pr_number, bytes = diff.len(), "diff fetched");
        Ok(diff)
    }

    async fn post_comment(&self, pr_number: u64, body: &str) -> SelectorResult<CommentReceipt> {
        let receipt = self
            .client
            .post_review_comment(&self.id(pr_number), body)
            .await?;
        info!(pr = pr_number, comment_id = receipt.id, "review comment posted");
        Ok(receipt)
    }
}
