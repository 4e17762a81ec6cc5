//! One PR through the selector loop.
//!
//! Flow:
//!   1) fetch the diff from the host;
//!   2) extract features and build the vector;
//!   3) select a prompt;
//!   4) generate the review (timed);
//!   5) evaluate it (heuristics + judge);
//!   6) feed `(features, prompt, score)` back to the learner;
//!   7) write per-PR artifacts;
//!   8) autosave state every `autosave_every` samples.
//!
//! Collaborator failures propagate untouched; nothing is retried here.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{Local, SecondsFormat};
use pr_gateway::CommentReceipt;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::artifacts::{ArtifactStore, results_file_name, review_file_name};
use crate::errors::{Error, SelectorResult};
use crate::features::{PrFeatures, extract_features};
use crate::host::ReviewHost;
use crate::learner::FitOutcome;
use crate::llm::ReviewGenerator;
use crate::persistence::DEFAULT_STATE_PATH;
use crate::prompts::{PromptRegistry, PromptTemplate};
use crate::regressor::{AnyRegressor, Regressor};
use crate::scoring::{Evaluation, MetaEvaluator, evaluate_review};
use crate::selector::PromptSelector;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Save state whenever `sample_count` is a multiple of this. 0 disables.
    pub autosave_every: usize,
    pub state_path: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            autosave_every: 3,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }
}

/// Result of one processed PR.
#[derive(Debug, Clone)]
pub struct PrOutcome {
    pub pr_number: u64,
    pub selected_prompt: String,
    pub review: String,
    pub score: f64,
    pub features: PrFeatures,
    pub generation_time: Duration,
}

/// Result of a one-off review with a named prompt.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub pr_number: u64,
    pub prompt: String,
    pub review: String,
    pub saved_to: PathBuf,
    pub comment: Option<CommentReceipt>,
}

pub struct Orchestrator<H, G, J, R: Regressor = AnyRegressor> {
    pub(crate) host: H,
    pub(crate) generator: G,
    pub(crate) judge: J,
    pub(crate) selector: PromptSelector<R>,
    pub(crate) registry: PromptRegistry,
    pub(crate) artifacts: ArtifactStore,
    cfg: OrchestratorConfig,
}

impl<H, G, J, R> Orchestrator<H, G, J, R>
where
    H: ReviewHost,
    G: ReviewGenerator,
    J: MetaEvaluator,
    R: Regressor,
{
    /// # Errors
    /// [`Error::Validation`] when the selector's arms differ from the registry.
    pub fn new(
        host: H,
        generator: G,
        judge: J,
        selector: PromptSelector<R>,
        registry: PromptRegistry,
        artifacts: ArtifactStore,
        cfg: OrchestratorConfig,
    ) -> SelectorResult<Self> {
        if selector.state().prompt_names() != registry.names().as_slice() {
            return Err(Error::Validation(format!(
                "selector prompts {:?} do not match registry {:?}",
                selector.state().prompt_names(),
                registry.names()
            )));
        }
        Ok(Self {
            host,
            generator,
            judge,
            selector,
            registry,
            artifacts,
            cfg,
        })
    }

    pub fn selector(&self) -> &PromptSelector<R> {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut PromptSelector<R> {
        &mut self.selector
    }

    pub fn registry(&self) -> &PromptRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.cfg
    }

    pub(crate) fn template(&self, name: &str) -> SelectorResult<&PromptTemplate> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::Validation(format!("unknown prompt `{name}`")))
    }

    /// Runs the full loop for one PR.
    pub async fn process_pr(&mut self, pr_number: u64) -> SelectorResult<PrOutcome> {
        let t0 = Instant::now();

        debug!(pr = pr_number, "step1: fetch diff");
        let diff = self.host.fetch_diff(pr_number).await?;

        let features = extract_features(&diff);
        let vector = features.vector();
        debug!(
            pr = pr_number,
            lines = features.num_lines,
            files = features.num_files,
            "step2: features extracted"
        );

        let selection = self.selector.select(&vector);
        let prompt_name = self
            .selector
            .state()
            .prompt_name(selection.index)
            .map(str::to_string)
            .ok_or_else(|| Error::Validation(format!("no prompt at index {}", selection.index)))?;
        let template = self.template(&prompt_name)?;
        info!(
            pr = pr_number,
            prompt = %prompt_name,
            mode = ?selection.mode,
            "step3: prompt selected"
        );

        let t_gen = Instant::now();
        let generated = self.generator.generate(pr_number, &diff, template).await?;
        let generation_time = t_gen.elapsed();
        debug!(
            pr = pr_number,
            gen_ms = generation_time.as_millis() as u64,
            "step4: review generated"
        );

        let evaluation =
            evaluate_review(&self.judge, &diff, &generated.review, generated.extras()).await;
        debug!(pr = pr_number, score = evaluation.score, "step5: review evaluated");

        let fit = self.selector.update_model(&vector, &prompt_name, evaluation.score)?;
        if let FitOutcome::Failed(e) = &fit {
            warn!(pr = pr_number, error = %e, "step6: model refit failed, observation kept");
        } else {
            debug!(pr = pr_number, ?fit, "step6: model updated");
        }

        let outcome = PrOutcome {
            pr_number,
            selected_prompt: prompt_name,
            review: generated.review,
            score: evaluation.score,
            features,
            generation_time,
        };
        self.save_results(&outcome, &evaluation).await?;
        debug!(pr = pr_number, "step7: artifacts saved");

        let samples = self.selector.state().sample_count();
        if self.cfg.autosave_every > 0 && samples % self.cfg.autosave_every == 0 {
            debug!(pr = pr_number, samples, "step8: autosave");
            self.selector.save_state(&self.cfg.state_path).await;
        }

        info!(
            pr = pr_number,
            prompt = %outcome.selected_prompt,
            score = outcome.score,
            samples,
            total_ms = t0.elapsed().as_millis() as u64,
            "PR processed"
        );
        Ok(outcome)
    }

    /// Writes the result record and the review text for one processed PR.
    pub async fn save_results(
        &self,
        outcome: &PrOutcome,
        evaluation: &Evaluation,
    ) -> SelectorResult<()> {
        let now = Local::now();
        let features: serde_json::Map<String, serde_json::Value> = outcome
            .features
            .to_map()
            .into_iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        let record = json!({
            "timestamp": now.to_rfc3339_opts(SecondsFormat::Secs, false),
            "pr_number": outcome.pr_number,
            "selected_prompt": outcome.selected_prompt,
            "review_score": outcome.score,
            "features": features,
            "heuristics": evaluation.heuristics,
            "meta_evaluation": evaluation.meta_json(),
            "training_samples": self.selector.state().sample_count(),
        });

        self.artifacts
            .save_json(&results_file_name(outcome.pr_number, &now), &record)
            .await?;
        self.artifacts
            .save_text(
                &review_file_name(outcome.pr_number, &outcome.selected_prompt),
                &outcome.review,
            )
            .await?;
        Ok(())
    }

    /// Reviews a PR with one named prompt without touching the learner.
    pub async fn review_once(
        &self,
        pr_number: u64,
        prompt: &str,
        post: bool,
    ) -> SelectorResult<ReviewOutcome> {
        let template = self.template(prompt)?;
        let diff = self.host.fetch_diff(pr_number).await?;
        let generated = self.generator.generate(pr_number, &diff, template).await?;

        let saved_to = self
            .artifacts
            .save_text(&review_file_name(pr_number, prompt), &generated.review)
            .await?;
        let comment = if post {
            Some(self.host.post_comment(pr_number, &generated.review).await?)
        } else {
            None
        };
        info!(
            pr = pr_number,
            prompt,
            posted = post,
            path = %saved_to.display(),
            "single review done"
        );

        Ok(ReviewOutcome {
            pr_number,
            prompt: prompt.to_string(),
            review: generated.review,
            saved_to,
            comment,
        })
    }
}
