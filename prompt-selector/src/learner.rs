//! Online model updates.
//!
//! Every observation is recorded first; only then is a full-batch refit of the
//! scaler and regressor attempted. A failing refit never removes history.

use tracing::{debug, info, warn};

use crate::errors::{Error, ModelError, SelectorResult};
use crate::features::FeatureVector;
use crate::policy::query_vector;
use crate::regressor::{Regressor, StandardScaler};
use crate::state::{Observation, SelectorState};

#[derive(Debug, Clone, PartialEq)]
pub struct LearnerConfig {
    /// Samples needed before the first fit (capped by the exploration length).
    pub min_samples_for_fit: usize,
    /// On fit failure, drop the fitted scaler and model instead of keeping the
    /// last good ones.
    pub reset_fit_on_failure: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            min_samples_for_fit: 5,
            reset_fit_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    /// Not enough samples yet.
    Deferred,
    Fitted,
    /// Refit failed; the observation is still recorded.
    Failed(ModelError),
}

/// Sample count at which fitting starts.
///
/// Never later than the end of round-robin, so exploitation always has a
/// fitted model available.
pub fn fit_threshold(cfg: &LearnerConfig, exploration_rounds: usize, prompt_count: usize) -> usize {
    let exploration = exploration_rounds * prompt_count;
    if exploration == 0 {
        cfg.min_samples_for_fit.max(1)
    } else {
        cfg.min_samples_for_fit.min(exploration).max(1)
    }
}

/// Training matrix: scaled features with the arm index appended.
pub fn training_set(
    state: &SelectorState,
    scaler: &StandardScaler,
) -> Result<(Vec<Vec<f64>>, Vec<f64>), ModelError> {
    let mut x = Vec::with_capacity(state.sample_count());
    let mut y = Vec::with_capacity(state.sample_count());
    for obs in state.observations() {
        let scaled = scaler.transform(&obs.features)?;
        x.push(query_vector(&scaled, obs.prompt_index));
        y.push(obs.score);
    }
    Ok((x, y))
}

/// Records `(features, prompt_name, score)` and refits when due.
///
/// # Errors
/// [`Error::Validation`] for an unknown prompt name or a non-finite score;
/// nothing is recorded in that case. Fit failures are reported through
/// [`FitOutcome::Failed`], not as errors.
#[allow(clippy::too_many_arguments)]
pub fn update_model<R: Regressor>(
    state: &mut SelectorState,
    scaler: &mut StandardScaler,
    model: &mut R,
    cfg: &LearnerConfig,
    exploration_rounds: usize,
    features: &FeatureVector,
    prompt_name: &str,
    score: f64,
) -> SelectorResult<FitOutcome> {
    let prompt_index = state
        .prompt_index(prompt_name)
        .ok_or_else(|| Error::Validation(format!("unknown prompt `{prompt_name}`")))?;
    if !score.is_finite() {
        return Err(Error::Validation(format!("non-finite score {score}")));
    }

    state.push(Observation {
        features: *features,
        prompt_index,
        score,
    });

    let threshold = fit_threshold(cfg, exploration_rounds, state.prompt_count());
    if state.sample_count() < threshold {
        debug!(samples = state.sample_count(), threshold, "fit deferred");
        return Ok(FitOutcome::Deferred);
    }

    Ok(refit(state, scaler, model, cfg.reset_fit_on_failure))
}

/// Refits scaler and model over the whole history.
///
/// The fit runs on copies; they replace the live scaler and model only on
/// success. On failure the live pair is either reset (`reset_on_failure`) or
/// left as it was.
pub fn refit<R: Regressor>(
    state: &mut SelectorState,
    scaler: &mut StandardScaler,
    model: &mut R,
    reset_on_failure: bool,
) -> FitOutcome {
    let mut next_scaler = scaler.clone();
    let mut next_model = model.clone();

    let attempt = next_scaler
        .fit(state.feature_history())
        .and_then(|()| training_set(state, &next_scaler))
        .and_then(|(x, y)| next_model.fit(&x, &y));

    match attempt {
        Ok(()) => {
            *scaler = next_scaler;
            *model = next_model;
            state.set_scaler_fitted(true);
            info!(samples = state.sample_count(), "model refitted");
            FitOutcome::Fitted
        }
        Err(e) => {
            warn!(
                error = %e,
                samples = state.sample_count(),
                reset_on_failure,
                "model refit failed"
            );
            if reset_on_failure {
                scaler.reset();
                model.reset();
                state.set_scaler_fitted(false);
            }
            FitOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use crate::regressor::{LinearParams, SgdRegressor};

    /// Fits normally until told to fail.
    #[derive(Clone, Default)]
    struct Flaky {
        inner: SgdRegressor,
        fail: bool,
    }

    impl Regressor for Flaky {
        fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
            if self.fail {
                return Err(ModelError::Singular);
            }
            self.inner.fit(x, y)
        }
        fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
            self.inner.predict(x)
        }
        fn is_fitted(&self) -> bool {
            self.inner.is_fitted()
        }
        fn params(&self) -> Option<LinearParams> {
            self.inner.params()
        }
        fn restore(&mut self, p: LinearParams) -> Result<(), ModelError> {
            self.inner.restore(p)
        }
        fn reset(&mut self) {
            self.inner.reset()
        }
    }

    fn vec_of(v: f64) -> FeatureVector {
        let mut f = [0.0; FEATURE_COUNT];
        f[0] = v;
        f[2] = v * 2.0;
        f
    }

    fn names() -> SelectorState {
        SelectorState::new(vec!["A".into(), "B".into()])
    }

    #[test]
    fn threshold_is_capped_by_exploration() {
        let cfg = LearnerConfig::default();
        assert_eq!(fit_threshold(&cfg, 2, 2), 4);
        assert_eq!(fit_threshold(&cfg, 2, 7), 5);
        assert_eq!(fit_threshold(&cfg, 0, 7), 5);
    }

    #[test]
    fn unknown_prompt_records_nothing() {
        let mut state = names();
        let err = update_model(
            &mut state,
            &mut StandardScaler::default(),
            &mut SgdRegressor::default(),
            &LearnerConfig::default(),
            2,
            &vec_of(1.0),
            "Missing",
            5.0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(state.sample_count(), 0);
    }

    #[test]
    fn fits_once_threshold_is_reached() {
        let mut state = names();
        let mut scaler = StandardScaler::default();
        let mut model = SgdRegressor::default();
        let cfg = LearnerConfig::default();

        let mut outcomes = Vec::new();
        for k in 0..4 {
            let name = if k % 2 == 0 { "A" } else { "B" };
            let features = vec_of(k as f64);
            let score = 5.0 + k as f64;
            let outcome =
                update_model(&mut state, &mut scaler, &mut model, &cfg, 2, &features, name, score);
            outcomes.push(outcome.unwrap());
        }
        assert_eq!(
            outcomes[..3],
            [FitOutcome::Deferred, FitOutcome::Deferred, FitOutcome::Deferred]
        );
        assert_eq!(outcomes[3], FitOutcome::Fitted);
        assert!(state.is_scaler_fitted());
        assert!(model.is_fitted());
        assert!(state.is_consistent());
    }

    fn fitted_flaky(reset: bool) -> (SelectorState, StandardScaler, Flaky, LearnerConfig) {
        let mut state = names();
        let mut scaler = StandardScaler::default();
        let mut model = Flaky::default();
        let cfg = LearnerConfig {
            reset_fit_on_failure: reset,
            ..LearnerConfig::default()
        };
        for k in 0..4 {
            let name = if k % 2 == 0 { "A" } else { "B" };
            update_model(&mut state, &mut scaler, &mut model, &cfg, 2, &vec_of(k as f64), name, 6.0)
                .unwrap();
        }
        assert!(model.is_fitted());
        (state, scaler, model, cfg)
    }

    #[test]
    fn failed_refit_with_reset_drops_fit_but_keeps_history() {
        let (mut state, mut scaler, mut model, cfg) = fitted_flaky(true);
        model.fail = true;

        let out = update_model(&mut state, &mut scaler, &mut model, &cfg, 2, &vec_of(9.0), "A", 3.0)
            .unwrap();

        assert_eq!(out, FitOutcome::Failed(ModelError::Singular));
        assert_eq!(state.sample_count(), 5);
        assert!(state.is_consistent());
        assert!(!state.is_scaler_fitted());
        assert!(!scaler.is_fitted());
        assert!(!model.is_fitted());
    }

    #[test]
    fn failed_refit_without_reset_keeps_last_good_fit() {
        let (mut state, mut scaler, mut model, cfg) = fitted_flaky(false);
        let before_params = model.params();
        let before_scaler = scaler.clone();
        model.fail = true;

        let out = update_model(&mut state, &mut scaler, &mut model, &cfg, 2, &vec_of(9.0), "B", 3.0)
            .unwrap();

        assert!(matches!(out, FitOutcome::Failed(_)));
        assert_eq!(state.sample_count(), 5);
        assert!(state.is_scaler_fitted());
        assert_eq!(scaler, before_scaler);
        assert_eq!(model.params(), before_params);
    }
}
