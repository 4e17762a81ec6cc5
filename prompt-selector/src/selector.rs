//! [`PromptSelector`]: learning state, scaler, regressor and RNG behind one owner.
//!
//! All mutation goes through `&mut self`, so one selector serves exactly one
//! sequential stream of PRs.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::debug;

use crate::errors::{Error, SelectorResult};
use crate::features::FeatureVector;
use crate::learner::{self, FitOutcome, LearnerConfig};
use crate::policy::{self, PolicyConfig, Selection};
use crate::regressor::{Regressor, SgdRegressor, StandardScaler};
use crate::state::SelectorState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorConfig {
    pub policy: PolicyConfig,
    pub learner: LearnerConfig,
}

/// Summary of what the selector has learned so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorStats {
    pub training_samples: usize,
    pub average_score: f64,
    /// Times each prompt was used, in registry order (zeros included).
    pub prompt_distribution: Vec<(String, usize)>,
    pub unique_prompts_used: usize,
    pub is_scaler_fitted: bool,
    pub model_fitted: bool,
}

#[derive(Debug, Clone)]
pub struct PromptSelector<R: Regressor = SgdRegressor> {
    pub(crate) state: SelectorState,
    pub(crate) scaler: StandardScaler,
    pub(crate) model: R,
    cfg: SelectorConfig,
    rng: StdRng,
}

impl PromptSelector<SgdRegressor> {
    /// Selector with the default SGD regressor.
    pub fn with_defaults(prompt_names: Vec<String>) -> SelectorResult<Self> {
        Self::new(prompt_names, SgdRegressor::default(), SelectorConfig::default())
    }
}

impl<R: Regressor> PromptSelector<R> {
    /// # Errors
    /// [`Error::Validation`] when `prompt_names` is empty or has duplicates.
    pub fn new(prompt_names: Vec<String>, model: R, cfg: SelectorConfig) -> SelectorResult<Self> {
        if prompt_names.is_empty() {
            return Err(Error::Validation("at least one prompt is required".into()));
        }
        for (i, name) in prompt_names.iter().enumerate() {
            if prompt_names[..i].contains(name) {
                return Err(Error::Validation(format!("duplicate prompt `{name}`")));
            }
        }
        if !(0.0..=1.0).contains(&cfg.policy.epsilon) {
            return Err(Error::Validation(format!(
                "epsilon must be within [0, 1], got {}",
                cfg.policy.epsilon
            )));
        }
        let rng = StdRng::seed_from_u64(cfg.policy.seed);
        Ok(Self {
            state: SelectorState::new(prompt_names),
            scaler: StandardScaler::default(),
            model,
            cfg,
            rng,
        })
    }

    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    pub fn model(&self) -> &R {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.cfg
    }

    /// Chooses the prompt for a diff's feature vector.
    pub fn select(&mut self, features: &FeatureVector) -> Selection {
        let sel = policy::select_prompt(
            features,
            &self.state,
            &self.scaler,
            &self.model,
            &self.cfg.policy,
            &mut self.rng,
        );
        debug!(
            index = sel.index,
            mode = ?sel.mode,
            samples = self.state.sample_count(),
            "prompt selected"
        );
        sel
    }

    /// Like [`Self::select`] but returns the prompt name.
    pub fn select_prompt(&mut self, features: &FeatureVector) -> String {
        let sel = self.select(features);
        self.state
            .prompt_name(sel.index)
            .unwrap_or_default()
            .to_string()
    }

    /// Records one scored review and refits when due.
    pub fn update_model(
        &mut self,
        features: &FeatureVector,
        prompt_name: &str,
        score: f64,
    ) -> SelectorResult<FitOutcome> {
        learner::update_model(
            &mut self.state,
            &mut self.scaler,
            &mut self.model,
            &self.cfg.learner,
            self.cfg.policy.exploration_rounds,
            features,
            prompt_name,
            score,
        )
    }

    pub fn stats(&self) -> SelectorStats {
        let scores = self.state.score_history();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let mut counts = vec![0usize; self.state.prompt_count()];
        for &i in self.state.prompt_history() {
            if let Some(c) = counts.get_mut(i) {
                *c += 1;
            }
        }
        let unique_prompts_used = counts.iter().filter(|c| **c > 0).count();
        let prompt_distribution = self
            .state
            .prompt_names()
            .iter()
            .cloned()
            .zip(counts)
            .collect();

        SelectorStats {
            training_samples: self.state.sample_count(),
            average_score,
            prompt_distribution,
            unique_prompts_used,
            is_scaler_fitted: self.state.is_scaler_fitted(),
            model_fitted: self.model.is_fitted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("P{i}")).collect()
    }

    #[test]
    fn rejects_bad_prompt_lists() {
        assert!(PromptSelector::with_defaults(vec![]).is_err());
        assert!(PromptSelector::with_defaults(vec!["A".into(), "A".into()]).is_err());
    }

    #[test]
    fn rejects_out_of_range_epsilon() {
        let cfg = SelectorConfig {
            policy: PolicyConfig {
                epsilon: 1.5,
                ..PolicyConfig::default()
            },
            ..SelectorConfig::default()
        };
        assert!(PromptSelector::new(names(2), SgdRegressor::default(), cfg).is_err());
    }

    #[test]
    fn stats_on_fresh_selector() {
        let s = PromptSelector::with_defaults(names(3)).unwrap();
        let stats = s.stats();
        assert_eq!(stats.training_samples, 0);
        assert_eq!(stats.average_score, 0.0);
        assert_eq!(stats.unique_prompts_used, 0);
        assert_eq!(stats.prompt_distribution.len(), 3);
        assert!(stats.prompt_distribution.iter().all(|(_, c)| *c == 0));
        assert!(!stats.is_scaler_fitted && !stats.model_fitted);
    }

    #[test]
    fn stats_after_updates() {
        let mut s = PromptSelector::with_defaults(names(3)).unwrap();
        let f = [1.0; FEATURE_COUNT];
        s.update_model(&f, "P0", 6.0).unwrap();
        s.update_model(&f, "P0", 8.0).unwrap();
        s.update_model(&f, "P2", 7.0).unwrap();

        let stats = s.stats();
        assert_eq!(stats.training_samples, 3);
        assert!((stats.average_score - 7.0).abs() < 1e-12);
        assert_eq!(
            stats.prompt_distribution,
            vec![("P0".to_string(), 2), ("P1".to_string(), 0), ("P2".to_string(), 1)]
        );
        assert_eq!(stats.unique_prompts_used, 2);
    }

    #[test]
    fn round_robin_then_model_choice() {
        let mut s = PromptSelector::with_defaults(names(2)).unwrap();
        let good = {
            let mut f = [0.0; FEATURE_COUNT];
            f[0] = 10.0;
            f
        };
        let bad = [0.0; FEATURE_COUNT];

        assert_eq!(s.select_prompt(&good), "P0");
        s.update_model(&good, "P0", 3.0).unwrap();
        assert_eq!(s.select_prompt(&bad), "P1");
        s.update_model(&bad, "P1", 9.0).unwrap();
        assert_eq!(s.select_prompt(&good), "P0");
        s.update_model(&good, "P0", 3.0).unwrap();
        assert_eq!(s.select_prompt(&bad), "P1");
        let outcome = s.update_model(&bad, "P1", 9.0).unwrap();

        assert_eq!(outcome, FitOutcome::Fitted);
        assert_eq!(s.state().sample_count(), 4);
        let sel = s.select(&bad);
        assert!(matches!(sel.mode, policy::SelectionMode::Exploit { .. }));
    }
}
