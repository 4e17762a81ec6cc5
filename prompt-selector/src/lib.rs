//! Online prompt selection for LLM pull-request reviews.
//!
//! Each PR diff is turned into a feature vector, a prompt strategy is picked
//! (round-robin first, then a regression model of expected review quality),
//! the generated review is scored, and the score is fed back to the model.
//!
//! - [`features`], [`heuristics`], [`scoring`]: pure text analysis
//! - [`policy`], [`learner`], [`regressor`], [`state`]: the bandit core,
//!   wrapped by [`selector::PromptSelector`]
//! - [`persistence`]: JSON state save/load with merge
//! - [`orchestrator`], [`runner`], [`benchmark`]: PR-level flows over the
//!   [`host::ReviewHost`], [`llm::ReviewGenerator`] and
//!   [`scoring::MetaEvaluator`] collaborators

pub mod artifacts;
pub mod benchmark;
pub mod config;
pub mod errors;
pub mod features;
pub mod heuristics;
pub mod host;
pub mod learner;
pub mod llm;
pub mod orchestrator;
pub mod persistence;
pub mod policy;
pub mod prompts;
pub mod regressor;
pub mod runner;
pub mod scoring;
pub mod selector;
pub mod state;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifacts::ArtifactStore;
pub use benchmark::{BenchmarkEntry, BenchmarkOptions, BenchmarkReport};
pub use config::{GitHubSettings, SelectorSettings};
pub use errors::{Error, SelectorResult};
pub use features::{FEATURE_COUNT, FeatureVector, PrFeatures, extract_features, features_to_vector};
pub use host::{GitHubHost, ReviewHost};
pub use llm::{GeneratedReview, LlmMetaEvaluator, LlmReviewGenerator, ReviewGenerator};
pub use orchestrator::{Orchestrator, OrchestratorConfig, PrOutcome, ReviewOutcome};
pub use prompts::{PromptRegistry, PromptTemplate};
pub use regressor::{AnyRegressor, Regressor, RidgeRegressor, SgdRegressor};
pub use runner::{RunOptions, RunReport, run_selector};
pub use scoring::{MetaEvaluator, MetaScores, ReviewExtras, evaluate_review};
pub use selector::{PromptSelector, SelectorConfig, SelectorStats};
