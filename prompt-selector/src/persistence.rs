//! JSON persistence of the selector's learning state.
//!
//! Saving writes a temp file next to the target and renames it over the
//! target. Loading validates the whole payload before touching anything and
//! merges history: saved observations whose feature vector is already known
//! are skipped.

use std::collections::HashSet;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{PersistError, SelectorResult};
use crate::features::{FEATURE_COUNT, FeatureVector};
use crate::regressor::{LinearParams, Regressor, ScalerParams, StandardScaler};
use crate::selector::PromptSelector;
use crate::state::Observation;

pub const DEFAULT_STATE_PATH: &str = "selector_state.json";

/// On-disk layout. Unfit parameters are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub prompt_names: Vec<String>,
    pub feature_history: Vec<Vec<f64>>,
    pub prompt_history: Vec<usize>,
    pub score_history: Vec<f64>,
    #[serde(default)]
    pub sample_count: usize,
    #[serde(default)]
    pub is_scaler_fitted: bool,
    #[serde(default)]
    pub scaler_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub scaler_scale: Option<Vec<f64>>,
    #[serde(default)]
    pub model_coef: Option<Vec<f64>>,
    #[serde(default)]
    pub model_intercept: Option<f64>,
    #[serde(default)]
    pub timestamp: String,
}

/// A snapshot that passed validation, ready to be merged.
struct ValidatedSnapshot {
    observations: Vec<Observation>,
    scaler: Option<StandardScaler>,
    model_params: Option<LinearParams>,
}

fn invalid(msg: impl Into<String>) -> PersistError {
    PersistError::Invalid(msg.into())
}

impl StateSnapshot {
    fn validate(self, prompt_names: &[String]) -> Result<ValidatedSnapshot, PersistError> {
        let n = self.feature_history.len();
        if self.prompt_history.len() != n || self.score_history.len() != n {
            return Err(invalid(format!(
                "history lengths differ: features={n} prompts={} scores={}",
                self.prompt_history.len(),
                self.score_history.len()
            )));
        }
        if !self.prompt_names.is_empty() && self.prompt_names != prompt_names {
            return Err(invalid(format!(
                "prompt names differ: saved {:?}, current {:?}",
                self.prompt_names, prompt_names
            )));
        }

        let mut observations = Vec::with_capacity(n);
        for (row, (&prompt_index, &score)) in self
            .feature_history
            .iter()
            .zip(self.prompt_history.iter().zip(&self.score_history))
        {
            let features: FeatureVector = row.as_slice().try_into().map_err(|_| {
                invalid(format!("feature row has {} values, expected {FEATURE_COUNT}", row.len()))
            })?;
            if features.iter().any(|v| !v.is_finite()) || !score.is_finite() {
                return Err(invalid("non-finite value in history"));
            }
            if prompt_index >= prompt_names.len() {
                return Err(invalid(format!("prompt index {prompt_index} out of range")));
            }
            observations.push(Observation {
                features,
                prompt_index,
                score,
            });
        }

        let scaler = match (self.scaler_mean, self.scaler_scale) {
            (Some(mean), Some(scale)) => {
                let mut s = StandardScaler::default();
                s.restore(ScalerParams { mean, scale })
                    .map_err(|e| invalid(format!("scaler: {e}")))?;
                Some(s)
            }
            (None, None) => None,
            _ => return Err(invalid("scaler mean and scale must be saved together")),
        };
        if self.is_scaler_fitted != scaler.is_some() {
            return Err(invalid(format!(
                "is_scaler_fitted is {} but scaler parameters are {}",
                self.is_scaler_fitted,
                if scaler.is_some() { "present" } else { "absent" }
            )));
        }

        let model_params = match (self.model_coef, self.model_intercept) {
            (Some(coef), Some(intercept)) => {
                if coef.len() != FEATURE_COUNT + 1 {
                    return Err(invalid(format!(
                        "model has {} coefficients, expected {}",
                        coef.len(),
                        FEATURE_COUNT + 1
                    )));
                }
                if scaler.is_none() {
                    return Err(invalid("model parameters saved without scaler parameters"));
                }
                Some(LinearParams { coef, intercept })
            }
            (None, None) => None,
            _ => return Err(invalid("model coefficients and intercept must be saved together")),
        };

        Ok(ValidatedSnapshot {
            observations,
            scaler,
            model_params,
        })
    }
}

impl<R: Regressor> PromptSelector<R> {
    /// Current state in its on-disk layout.
    pub fn snapshot(&self) -> StateSnapshot {
        let scaler = self.scaler.params();
        let model = self.model.params();
        StateSnapshot {
            prompt_names: self.state.prompt_names().to_vec(),
            feature_history: self.state.feature_history().iter().map(|f| f.to_vec()).collect(),
            prompt_history: self.state.prompt_history().to_vec(),
            score_history: self.state.score_history().to_vec(),
            sample_count: self.state.sample_count(),
            is_scaler_fitted: self.state.is_scaler_fitted(),
            scaler_mean: scaler.map(|p| p.mean.clone()),
            scaler_scale: scaler.map(|p| p.scale.clone()),
            model_coef: model.as_ref().map(|p| p.coef.clone()),
            model_intercept: model.map(|p| p.intercept),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Writes the state to `path`. Returns `false` (and logs) on failure.
    pub async fn save_state(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.write_state(path).await {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    samples = self.state.sample_count(),
                    "selector state saved"
                );
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save selector state");
                false
            }
        }
    }

    /// Merges the state stored at `path`. Returns `false` when the file is
    /// missing or unusable; the selector is left untouched in that case.
    pub async fn load_state(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no saved selector state, starting fresh");
                return false;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read selector state");
                return false;
            }
        };

        let snapshot: StateSnapshot = match serde_json::from_slice(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt selector state file ignored");
                return false;
            }
        };

        match self.apply_snapshot(snapshot) {
            Ok(added) => {
                info!(
                    path = %path.display(),
                    added,
                    samples = self.state.sample_count(),
                    model_fitted = self.model.is_fitted(),
                    "selector state loaded"
                );
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid selector state file ignored");
                false
            }
        }
    }

    async fn write_state(&self, path: &Path) -> SelectorResult<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Validates then merges; returns how many observations were appended.
    pub fn apply_snapshot(&mut self, snapshot: StateSnapshot) -> Result<usize, PersistError> {
        let validated = snapshot.validate(self.state.prompt_names())?;

        let mut model = self.model.clone();
        if let Some(params) = validated.model_params {
            model
                .restore(params)
                .map_err(|e| invalid(format!("model: {e}")))?;
        }

        let known: HashSet<[u64; FEATURE_COUNT]> =
            self.state.feature_history().iter().map(bits).collect();
        let mut added = 0usize;
        for obs in validated.observations {
            if known.contains(&bits(&obs.features)) {
                debug!(prompt_index = obs.prompt_index, "skipping already known observation");
                continue;
            }
            self.state.push(obs);
            added += 1;
        }

        if let Some(scaler) = validated.scaler {
            self.scaler = scaler;
            self.model = model;
            self.state.set_scaler_fitted(true);
        }
        Ok(added)
    }
}

fn bits(f: &FeatureVector) -> [u64; FEATURE_COUNT] {
    f.map(f64::to_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::SgdRegressor;
    use tempfile::TempDir;

    fn selector() -> PromptSelector<SgdRegressor> {
        PromptSelector::with_defaults(vec!["A".into(), "B".into()]).unwrap()
    }

    fn feat(v: f64) -> FeatureVector {
        let mut f = [0.0; FEATURE_COUNT];
        f[0] = v;
        f[3] = v * 3.0;
        f
    }

    fn trained() -> PromptSelector<SgdRegressor> {
        let mut s = selector();
        for k in 0..4 {
            let name = if k % 2 == 0 { "A" } else { "B" };
            s.update_model(&feat(k as f64), name, 4.0 + k as f64).unwrap();
        }
        assert!(s.model().is_fitted());
        s
    }

    #[tokio::test]
    async fn save_then_load_restores_state_and_fit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let original = trained();
        assert!(original.save_state(&path).await);

        let mut fresh = selector();
        assert!(fresh.load_state(&path).await);
        assert_eq!(fresh.state().sample_count(), 4);
        assert_eq!(fresh.state().feature_history(), original.state().feature_history());
        assert_eq!(fresh.state().prompt_history(), original.state().prompt_history());
        assert_eq!(fresh.state().score_history(), original.state().score_history());
        assert!(fresh.state().is_scaler_fitted());
        assert_eq!(fresh.model().params(), original.model().params());
        assert_eq!(fresh.scaler(), original.scaler());
    }

    #[tokio::test]
    async fn saved_file_uses_flat_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        assert!(selector().save_state(&path).await);

        let v: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        for key in [
            "prompt_names",
            "feature_history",
            "prompt_history",
            "score_history",
            "sample_count",
            "is_scaler_fitted",
            "scaler_mean",
            "scaler_scale",
            "model_coef",
            "model_intercept",
            "timestamp",
        ] {
            assert!(v.get(key).is_some(), "missing key {key}");
        }
        assert!(v["model_coef"].is_null());
        assert!(v["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn loading_twice_skips_known_vectors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        assert!(trained().save_state(&path).await);

        let mut s = selector();
        assert!(s.load_state(&path).await);
        assert!(s.load_state(&path).await);
        assert_eq!(s.state().sample_count(), 4);
        assert!(s.state().is_consistent());
    }

    #[test]
    fn merge_appends_only_new_vectors() {
        let mut s = selector();
        s.update_model(&feat(0.0), "A", 5.0).unwrap();

        let mut snap = trained().snapshot();
        snap.model_coef = None;
        snap.model_intercept = None;
        snap.scaler_mean = None;
        snap.scaler_scale = None;
        snap.is_scaler_fitted = false;

        let added = s.apply_snapshot(snap).unwrap();
        assert_eq!(added, 3);
        assert_eq!(s.state().sample_count(), 4);
        assert!(!s.model().is_fitted());
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), b"x").unwrap();

        assert!(!trained().save_state(&path).await);
        assert!(!dir.path().join("state.json.tmp").exists());
        assert!(path.join("occupied").exists());
    }

    #[tokio::test]
    async fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut s = selector();
        assert!(!s.load_state(dir.path().join("nope.json")).await);
        assert_eq!(s.state().sample_count(), 0);
    }

    #[tokio::test]
    async fn corrupt_file_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let mut s = trained();
        let before = s.snapshot();
        assert!(!s.load_state(&path).await);
        assert_eq!(s.state().sample_count(), before.sample_count);
        assert_eq!(s.model().params().map(|p| p.coef), before.model_coef);
    }

    #[test]
    fn structurally_invalid_snapshots_are_rejected() {
        let base = trained().snapshot();

        let mut short_row = base.clone();
        short_row.feature_history[0].pop();
        let mut bad_index = base.clone();
        bad_index.prompt_history[1] = 9;
        let mut ragged = base.clone();
        ragged.score_history.pop();
        let mut names = base.clone();
        names.prompt_names = vec!["X".into(), "Y".into()];
        let mut coef = base.clone();
        coef.model_coef = Some(vec![0.0; 3]);
        let mut flag_without_scaler = base.clone();
        flag_without_scaler.scaler_mean = None;
        flag_without_scaler.scaler_scale = None;
        flag_without_scaler.model_coef = None;
        flag_without_scaler.model_intercept = None;
        let mut scaler_without_flag = base.clone();
        scaler_without_flag.is_scaler_fitted = false;

        for snap in [
            short_row,
            bad_index,
            ragged,
            names,
            coef,
            flag_without_scaler,
            scaler_without_flag,
        ] {
            let mut s = selector();
            assert!(s.apply_snapshot(snap).is_err());
            assert_eq!(s.state().sample_count(), 0);
            assert!(!s.model().is_fitted());
        }
    }
}
