//! Linear regressors and the feature scaler used by the learner.
//!
//! Both regressors are plain linear models `y = w·x + b` so their parameters
//! share one serialized shape ([`LinearParams`]). [`AnyRegressor`] lets the
//! binary pick one at runtime without trait objects.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::features::{FEATURE_COUNT, FeatureVector};

/// Fitted coefficients and intercept of a linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearParams {
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        if x.len() != self.coef.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.coef.len(),
                got: x.len(),
            });
        }
        let y = dot(&self.coef, x) + self.intercept;
        if y.is_finite() {
            Ok(y)
        } else {
            Err(ModelError::NonFinite("prediction"))
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.coef.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if !self.intercept.is_finite() || self.coef.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::NonFinite("parameters"));
        }
        Ok(())
    }
}

/// Minimal regressor contract the learner and policy rely on.
pub trait Regressor: Clone {
    /// Full-batch fit over `x` rows and `y` targets.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError>;
    fn predict(&self, x: &[f64]) -> Result<f64, ModelError>;
    fn is_fitted(&self) -> bool;
    /// Fitted parameters, `None` while unfit.
    fn params(&self) -> Option<LinearParams>;
    fn restore(&mut self, params: LinearParams) -> Result<(), ModelError>;
    fn reset(&mut self);
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(ModelError::LengthMismatch {
            samples: x.len(),
            targets: y.len(),
        });
    }
    let dim = x[0].len();
    if dim == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    for row in x {
        if row.len() != dim {
            return Err(ModelError::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("features"));
        }
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite("targets"));
    }
    Ok(dim)
}

/* ------------------------------------------------------------------------- */
/* Scaler                                                                    */
/* ------------------------------------------------------------------------- */

/// Per-dimension standardization `(x - mean) / scale`.
///
/// `scale` is the population standard deviation; constant dimensions get 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(&mut self, rows: &[FeatureVector]) -> Result<(), ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("features"));
        }
        let n = rows.len() as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m);
            }
        }
        for s in scale.iter_mut() {
            let sd = (*s / n).sqrt();
            *s = if sd > f64::EPSILON { sd } else { 1.0 };
        }

        self.params = Some(ScalerParams { mean, scale });
        Ok(())
    }

    pub fn transform(&self, row: &FeatureVector) -> Result<FeatureVector, ModelError> {
        let p = self.params.as_ref().ok_or(ModelError::NotFitted)?;
        let mut out = [0.0; FEATURE_COUNT];
        for (i, o) in out.iter_mut().enumerate() {
            *o = (row[i] - p.mean[i]) / p.scale[i];
        }
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("scaled features"));
        }
        Ok(out)
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    pub fn params(&self) -> Option<&ScalerParams> {
        self.params.as_ref()
    }

    pub fn restore(&mut self, params: ScalerParams) -> Result<(), ModelError> {
        for v in [&params.mean, &params.scale] {
            if v.len() != FEATURE_COUNT {
                return Err(ModelError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    got: v.len(),
                });
            }
        }
        if params.mean.iter().any(|v| !v.is_finite())
            || params.scale.iter().any(|v| !v.is_finite() || *v == 0.0)
        {
            return Err(ModelError::NonFinite("scaler parameters"));
        }
        self.params = Some(params);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.params = None;
    }
}

/* ------------------------------------------------------------------------- */
/* SGD                                                                       */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub struct SgdConfig {
    /// L2 penalty strength.
    pub alpha: f64,
    /// Constant learning rate.
    pub eta0: f64,
    pub max_iter: usize,
    /// Improvement threshold on the summed epoch loss, per sample.
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
    /// Start from the current weights when dimensions match.
    pub warm_start: bool,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            alpha: 1e-4,
            eta0: 0.01,
            max_iter: 1000,
            tol: 1e-3,
            n_iter_no_change: 5,
            seed: 42,
            warm_start: true,
        }
    }
}

/// Squared-loss linear regression trained by stochastic gradient descent.
#[derive(Debug, Clone, Default)]
pub struct SgdRegressor {
    cfg: SgdConfig,
    params: Option<LinearParams>,
    /// Epochs run by the last fit.
    n_iter: usize,
}

impl SgdRegressor {
    pub fn new(cfg: SgdConfig) -> Self {
        Self {
            cfg,
            params: None,
            n_iter: 0,
        }
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

// Gradient clip for a single sample.
const MAX_DLOSS: f64 = 1e12;

impl Regressor for SgdRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let dim = check_training_set(x, y)?;
        let n = x.len();

        let (mut w, mut b) = match &self.params {
            Some(p) if self.cfg.warm_start && p.coef.len() == dim => (p.coef.clone(), p.intercept),
            _ => (vec![0.0; dim], 0.0),
        };

        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let mut order: Vec<usize> = (0..n).collect();
        let eta = self.cfg.eta0;
        let decay = 1.0 - eta * self.cfg.alpha;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut epochs = 0usize;

        for _ in 0..self.cfg.max_iter {
            epochs += 1;
            order.shuffle(&mut rng);
            let mut sum_loss = 0.0;

            for &i in &order {
                let p = dot(&w, &x[i]) + b;
                let err = p - y[i];
                sum_loss += 0.5 * err * err;
                let dloss = err.clamp(-MAX_DLOSS, MAX_DLOSS);

                for (wj, xj) in w.iter_mut().zip(&x[i]) {
                    *wj = *wj * decay - eta * dloss * xj;
                }
                b -= eta * dloss;
            }

            if !sum_loss.is_finite() || w.iter().any(|v| !v.is_finite()) || !b.is_finite() {
                return Err(ModelError::Diverged { epochs });
            }

            if sum_loss > best_loss - self.cfg.tol * n as f64 {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if sum_loss < best_loss {
                best_loss = sum_loss;
            }
            if no_improvement >= self.cfg.n_iter_no_change {
                break;
            }
        }

        self.n_iter = epochs;
        self.params = Some(LinearParams { coef: w, intercept: b });
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        self.params.as_ref().ok_or(ModelError::NotFitted)?.predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn params(&self) -> Option<LinearParams> {
        self.params.clone()
    }

    fn restore(&mut self, params: LinearParams) -> Result<(), ModelError> {
        params.validate()?;
        self.params = Some(params);
        Ok(())
    }

    fn reset(&mut self) {
        self.params = None;
        self.n_iter = 0;
    }
}

/* ------------------------------------------------------------------------- */
/* Ridge                                                                     */
/* ------------------------------------------------------------------------- */

/// Closed-form ridge regression with an unpenalized intercept.
#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    alpha: f64,
    params: Option<LinearParams>,
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            params: None,
        }
    }
}

impl Regressor for RidgeRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        let dim = check_training_set(x, y)?;
        let n = x.len() as f64;

        // Center so the intercept stays out of the penalty.
        let mut x_mean = vec![0.0; dim];
        for row in x {
            for (m, v) in x_mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let y_mean = y.iter().sum::<f64>() / n;

        // Normal equations: (XcᵀXc + αI) w = Xcᵀyc
        let mut a = vec![vec![0.0; dim]; dim];
        let mut rhs = vec![0.0; dim];
        for (row, target) in x.iter().zip(y) {
            let yc = target - y_mean;
            for i in 0..dim {
                let xi = row[i] - x_mean[i];
                rhs[i] += xi * yc;
                for j in 0..dim {
                    a[i][j] += xi * (row[j] - x_mean[j]);
                }
            }
        }
        for (i, r) in a.iter_mut().enumerate() {
            r[i] += self.alpha;
        }

        let w = solve(a, rhs)?;
        let intercept = y_mean - dot(&w, &x_mean);
        let params = LinearParams { coef: w, intercept };
        params.validate()?;
        self.params = Some(params);
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        self.params.as_ref().ok_or(ModelError::NotFitted)?.predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn params(&self) -> Option<LinearParams> {
        self.params.clone()
    }

    fn restore(&mut self, params: LinearParams) -> Result<(), ModelError> {
        params.validate()?;
        self.params = Some(params);
        Ok(())
    }

    fn reset(&mut self) {
        self.params = None;
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ModelError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(ModelError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

/* ------------------------------------------------------------------------- */
/* Runtime choice                                                            */
/* ------------------------------------------------------------------------- */

/// Regressor picked from configuration (`sgd` or `ridge`).
#[derive(Debug, Clone)]
pub enum AnyRegressor {
    Sgd(SgdRegressor),
    Ridge(RidgeRegressor),
}

impl Default for AnyRegressor {
    fn default() -> Self {
        AnyRegressor::Sgd(SgdRegressor::default())
    }
}

impl Regressor for AnyRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        match self {
            AnyRegressor::Sgd(r) => r.fit(x, y),
            AnyRegressor::Ridge(r) => r.fit(x, y),
        }
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        match self {
            AnyRegressor::Sgd(r) => r.predict(x),
            AnyRegressor::Ridge(r) => r.predict(x),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            AnyRegressor::Sgd(r) => r.is_fitted(),
            AnyRegressor::Ridge(r) => r.is_fitted(),
        }
    }

    fn params(&self) -> Option<LinearParams> {
        match self {
            AnyRegressor::Sgd(r) => r.params(),
            AnyRegressor::Ridge(r) => r.params(),
        }
    }

    fn restore(&mut self, params: LinearParams) -> Result<(), ModelError> {
        match self {
            AnyRegressor::Sgd(r) => r.restore(params),
            AnyRegressor::Ridge(r) => r.restore(params),
        }
    }

    fn reset(&mut self) {
        match self {
            AnyRegressor::Sgd(r) => r.reset(),
            AnyRegressor::Ridge(r) => r.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        // y = 2a - b + 1 on a centered grid
        let mut x = Vec::new();
        let mut y = Vec::new();
        for a in -2..=2 {
            for b in -2..=2 {
                let (a, b) = (a as f64 * 0.5, b as f64 * 0.5);
                x.push(vec![a, b]);
                y.push(2.0 * a - b + 1.0);
            }
        }
        (x, y)
    }

    #[test]
    fn scaler_standardizes_and_handles_constant_columns() {
        let mut rows = vec![[0.0; FEATURE_COUNT]; 2];
        rows[0][0] = 1.0;
        rows[1][0] = 3.0;
        let mut s = StandardScaler::default();
        s.fit(&rows).unwrap();

        let p = s.params().unwrap();
        assert_eq!(p.mean[0], 2.0);
        assert_eq!(p.scale[0], 1.0);
        assert_eq!(p.scale[5], 1.0);

        let t = s.transform(&rows[1]).unwrap();
        assert_eq!(t[0], 1.0);
        assert_eq!(t[5], 0.0);
    }

    #[test]
    fn unfit_scaler_refuses_to_transform() {
        let s = StandardScaler::default();
        assert_eq!(s.transform(&[0.0; FEATURE_COUNT]), Err(ModelError::NotFitted));
    }

    #[test]
    fn ridge_recovers_linear_relation() {
        let (x, y) = linear_data();
        let mut r = RidgeRegressor::new(1e-6);
        r.fit(&x, &y).unwrap();
        let pred = r.predict(&[1.0, 0.5]).unwrap();
        assert!((pred - 2.5).abs() < 1e-3, "pred = {pred}");
    }

    #[test]
    fn sgd_approaches_linear_relation() {
        let (x, y) = linear_data();
        let mut r = SgdRegressor::default();
        r.fit(&x, &y).unwrap();
        let pred = r.predict(&[1.0, 0.5]).unwrap();
        assert!((pred - 2.5).abs() < 0.3, "pred = {pred}");
        assert!(r.n_iter() >= 1 && r.n_iter() <= 1000);
    }

    #[test]
    fn sgd_is_deterministic_for_a_seed() {
        let (x, y) = linear_data();
        let mut a = SgdRegressor::default();
        let mut b = SgdRegressor::default();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.params(), b.params());
    }

    #[test]
    fn fit_rejects_bad_input() {
        let mut r = SgdRegressor::default();
        assert_eq!(r.fit(&[], &[]), Err(ModelError::EmptyTrainingSet));
        assert!(matches!(
            r.fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
        assert_eq!(
            r.fit(&[vec![f64::NAN]], &[1.0]),
            Err(ModelError::NonFinite("features"))
        );
        assert!(!r.is_fitted());
    }

    #[test]
    fn predict_checks_dimension() {
        let mut r = RidgeRegressor::default();
        r.restore(LinearParams {
            coef: vec![1.0, 1.0],
            intercept: 0.0,
        })
        .unwrap();
        assert!(r.predict(&[1.0]).is_err());
        assert_eq!(r.predict(&[1.0, 2.0]).unwrap(), 3.0);
    }

    #[test]
    fn any_regressor_dispatches() {
        let (x, y) = linear_data();
        let mut r = AnyRegressor::Ridge(RidgeRegressor::new(1e-6));
        r.fit(&x, &y).unwrap();
        assert!(r.is_fitted());
        r.reset();
        assert!(!r.is_fitted());
    }
}
