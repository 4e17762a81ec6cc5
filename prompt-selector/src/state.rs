//! Learning state: ordered prompt arms plus the observation history.
//!
//! The three histories are parallel and only ever grow. `sample_count` always
//! equals their common length.

use crate::features::FeatureVector;

/// One training example.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub features: FeatureVector,
    pub prompt_index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorState {
    prompt_names: Vec<String>,
    feature_history: Vec<FeatureVector>,
    prompt_history: Vec<usize>,
    score_history: Vec<f64>,
    sample_count: usize,
    is_scaler_fitted: bool,
}

impl SelectorState {
    pub fn new(prompt_names: Vec<String>) -> Self {
        Self {
            prompt_names,
            ..Self::default()
        }
    }

    pub fn prompt_names(&self) -> &[String] {
        &self.prompt_names
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_names.len()
    }

    pub fn prompt_index(&self, name: &str) -> Option<usize> {
        self.prompt_names.iter().position(|n| n == name)
    }

    pub fn prompt_name(&self, index: usize) -> Option<&str> {
        self.prompt_names.get(index).map(String::as_str)
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn is_scaler_fitted(&self) -> bool {
        self.is_scaler_fitted
    }

    pub fn feature_history(&self) -> &[FeatureVector] {
        &self.feature_history
    }

    pub fn prompt_history(&self) -> &[usize] {
        &self.prompt_history
    }

    pub fn score_history(&self) -> &[f64] {
        &self.score_history
    }

    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.feature_history
            .iter()
            .zip(&self.prompt_history)
            .zip(&self.score_history)
            .map(|((f, p), s)| Observation {
                features: *f,
                prompt_index: *p,
                score: *s,
            })
    }

    /// Appends an observation. The caller guarantees `prompt_index` is valid.
    pub(crate) fn push(&mut self, obs: Observation) {
        debug_assert!(obs.prompt_index < self.prompt_names.len());
        self.feature_history.push(obs.features);
        self.prompt_history.push(obs.prompt_index);
        self.score_history.push(obs.score);
        self.sample_count = self.feature_history.len();
    }

    pub(crate) fn set_scaler_fitted(&mut self, fitted: bool) {
        self.is_scaler_fitted = fitted;
    }

    /// Checks the parallel-history invariants.
    pub fn is_consistent(&self) -> bool {
        let n = self.feature_history.len();
        self.prompt_history.len() == n
            && self.score_history.len() == n
            && self.sample_count == n
            && self
                .prompt_history
                .iter()
                .all(|i| *i < self.prompt_names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;

    #[test]
    fn push_keeps_histories_parallel() {
        let mut s = SelectorState::new(vec!["A".into(), "B".into()]);
        assert!(s.is_consistent());
        s.push(Observation {
            features: [1.0; FEATURE_COUNT],
            prompt_index: 1,
            score: 7.5,
        });
        assert_eq!(s.sample_count(), 1);
        assert!(s.is_consistent());
        let obs: Vec<_> = s.observations().collect();
        assert_eq!(obs[0].prompt_index, 1);
        assert_eq!(obs[0].score, 7.5);
    }

    #[test]
    fn resolves_prompt_names() {
        let s = SelectorState::new(vec!["Zero-shot".into(), "Meta".into()]);
        assert_eq!(s.prompt_index("Meta"), Some(1));
        assert_eq!(s.prompt_index("Nope"), None);
        assert_eq!(s.prompt_name(0), Some("Zero-shot"));
    }
}
