//! GitHub access for the prompt selector: fetch a PR's unified diff and post
//! review comments back to it.

pub mod errors;
pub mod github;
pub mod types;

pub use errors::{GatewayError, GatewayResult, ProviderError};
pub use github::GitHubClient;
pub use types::{CommentReceipt, GatewayConfig, PullRequestId};
