//! Prompt selection: round-robin exploration, then model-driven exploitation.
//!
//! While `sample_count < exploration_rounds * n` or the model is unfit, arms are
//! tried in order (`sample_count mod n`). Afterwards every arm is scored by the
//! regressor on `features ⊕ [arm index]` and the best one wins, lowest index on
//! ties. With `epsilon > 0` a uniformly random non-best arm is taken instead
//! with that probability.

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::features::FeatureVector;
use crate::regressor::{Regressor, StandardScaler};
use crate::state::SelectorState;

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Full round-robin passes before exploitation.
    pub exploration_rounds: usize,
    /// Residual exploration probability after round-robin, in [0, 1].
    pub epsilon: f64,
    pub seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            exploration_rounds: 2,
            epsilon: 0.0,
            seed: 42,
        }
    }
}

/// How an arm was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionMode {
    RoundRobin,
    Exploit { predicted: f64 },
    /// Random non-best arm; `best` is the arm the model preferred.
    Explore { best: usize },
    /// Every prediction failed.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub mode: SelectionMode,
}

/// Builds the model input for one arm.
pub fn query_vector(features: &FeatureVector, prompt_index: usize) -> Vec<f64> {
    let mut q = Vec::with_capacity(features.len() + 1);
    q.extend_from_slice(features);
    q.push(prompt_index as f64);
    q
}

/// Scaled features when the scaler is usable, raw features otherwise.
pub fn model_features(
    features: &FeatureVector,
    state: &SelectorState,
    scaler: &StandardScaler,
) -> FeatureVector {
    if !state.is_scaler_fitted() {
        return *features;
    }
    match scaler.transform(features) {
        Ok(scaled) => scaled,
        Err(e) => {
            warn!(error = %e, "scaler transform failed, using raw features");
            *features
        }
    }
}

/// Picks an arm. Never fails; an empty arm list yields index 0.
pub fn select_prompt<R: Regressor>(
    features: &FeatureVector,
    state: &SelectorState,
    scaler: &StandardScaler,
    model: &R,
    cfg: &PolicyConfig,
    rng: &mut StdRng,
) -> Selection {
    let n = state.prompt_count();
    if n == 0 {
        return Selection {
            index: 0,
            mode: SelectionMode::Fallback,
        };
    }

    let samples = state.sample_count();
    if samples < cfg.exploration_rounds * n || !model.is_fitted() {
        return Selection {
            index: samples % n,
            mode: SelectionMode::RoundRobin,
        };
    }

    let x = model_features(features, state, scaler);
    let mut best: Option<(usize, f64)> = None;
    for i in 0..n {
        match model.predict(&query_vector(&x, i)) {
            Ok(p) if p.is_finite() => {
                if best.is_none_or(|(_, b)| p > b) {
                    best = Some((i, p));
                }
            }
            Ok(_) => debug!(arm = i, "non-finite prediction skipped"),
            Err(e) => debug!(arm = i, error = %e, "prediction failed, arm skipped"),
        }
    }

    let Some((best_idx, predicted)) = best else {
        warn!("all predictions failed, falling back to the first prompt");
        return Selection {
            index: 0,
            mode: SelectionMode::Fallback,
        };
    };

    if n > 1 && cfg.epsilon > 0.0 && rng.random::<f64>() < cfg.epsilon {
        let k = rng.random_range(0..n - 1);
        let index = if k >= best_idx { k + 1 } else { k };
        return Selection {
            index,
            mode: SelectionMode::Explore { best: best_idx },
        };
    }

    Selection {
        index: best_idx,
        mode: SelectionMode::Exploit { predicted },
    }
}
