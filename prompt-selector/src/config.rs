//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{ConfigError, SelectorResult};
use crate::learner::LearnerConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::persistence::DEFAULT_STATE_PATH;
use crate::policy::PolicyConfig;
use crate::regressor::{AnyRegressor, RidgeRegressor, SgdConfig, SgdRegressor};
use crate::runner::RunOptions;
use crate::selector::SelectorConfig;

pub const DEFAULT_OUTPUT_DIR: &str = "selector_output";

/// `true` for "1", "true", "yes", "on"; `default_` when unset.
pub fn env_flag(name: &str, default_: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default_,
    }
}

pub fn env_usize(name: &str, default_: usize) -> usize {
    parse(name, default_)
}

fn env(k: &str, dflt: &str) -> String {
    std::env::var(k).unwrap_or_else(|_| dflt.to_string())
}

fn parse<T: FromStr>(k: &str, dflt: T) -> T {
    std::env::var(k)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(dflt)
}

fn required(k: &'static str) -> Result<String, ConfigError> {
    match std::env::var(k) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingVar(k)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegressorKind {
    #[default]
    Sgd,
    Ridge,
}

impl FromStr for RegressorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd),
            "ridge" => Ok(Self::Ridge),
            other => Err(ConfigError::InvalidValue {
                var: "SELECTOR_REGRESSOR",
                reason: format!("unknown regressor `{other}` (expected sgd or ridge)"),
            }),
        }
    }
}

/// Selector, orchestrator and runner knobs. Every field has a default.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorSettings {
    pub state_path: PathBuf,
    pub output_dir: PathBuf,
    pub autosave_every: usize,
    pub save_frequency: usize,
    pub pause: Duration,
    pub min_samples_for_fit: usize,
    pub exploration_rounds: usize,
    pub epsilon: f64,
    pub seed: u64,
    pub reset_fit_on_failure: bool,
    pub regressor: RegressorKind,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            autosave_every: 3,
            save_frequency: 5,
            pause: Duration::from_millis(1000),
            min_samples_for_fit: 5,
            exploration_rounds: 2,
            epsilon: 0.0,
            seed: 42,
            reset_fit_on_failure: true,
            regressor: RegressorKind::Sgd,
        }
    }
}

impl SelectorSettings {
    /// # Errors
    /// [`ConfigError::InvalidValue`] for an out-of-range epsilon or an unknown
    /// regressor name. Other unparsable values fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        let epsilon: f64 = parse("SELECTOR_EPSILON", d.epsilon);
        if !(0.0..=1.0).contains(&epsilon) {
            return Err(ConfigError::InvalidValue {
                var: "SELECTOR_EPSILON",
                reason: format!("{epsilon} is outside [0, 1]"),
            });
        }
        let regressor = match std::env::var("SELECTOR_REGRESSOR") {
            Ok(v) => v.parse()?,
            Err(_) => d.regressor,
        };

        Ok(Self {
            state_path: PathBuf::from(env("SELECTOR_STATE_PATH", DEFAULT_STATE_PATH)),
            output_dir: PathBuf::from(env("SELECTOR_OUTPUT_DIR", DEFAULT_OUTPUT_DIR)),
            autosave_every: parse("SELECTOR_AUTOSAVE_EVERY", d.autosave_every),
            save_frequency: parse("SELECTOR_SAVE_FREQUENCY", d.save_frequency),
            pause: Duration::from_millis(parse("SELECTOR_PAUSE_MS", 1000u64)),
            min_samples_for_fit: parse("SELECTOR_MIN_SAMPLES", d.min_samples_for_fit),
            exploration_rounds: parse("SELECTOR_EXPLORATION_ROUNDS", d.exploration_rounds),
            epsilon,
            seed: parse("SELECTOR_SEED", d.seed),
            reset_fit_on_failure: env_flag("SELECTOR_RESET_ON_FIT_FAILURE", d.reset_fit_on_failure),
            regressor,
        })
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            policy: PolicyConfig {
                exploration_rounds: self.exploration_rounds,
                epsilon: self.epsilon,
                seed: self.seed,
            },
            learner: LearnerConfig {
                min_samples_for_fit: self.min_samples_for_fit,
                reset_fit_on_failure: self.reset_fit_on_failure,
            },
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            autosave_every: self.autosave_every,
            state_path: self.state_path.clone(),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            save_frequency: self.save_frequency,
            pause: self.pause,
            ..RunOptions::default()
        }
    }

    pub fn build_regressor(&self) -> AnyRegressor {
        match self.regressor {
            RegressorKind::Sgd => AnyRegressor::Sgd(SgdRegressor::new(SgdConfig {
                seed: self.seed,
                ..SgdConfig::default()
            })),
            RegressorKind::Ridge => AnyRegressor::Ridge(RidgeRegressor::default()),
        }
    }
}

/// Target repository and credentials for the GitHub host.
#[derive(Clone)]
pub struct GitHubSettings {
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub api_url: String,
}

impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"***")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GitHubSettings {
    /// Reads `OWNER`, `REPO`, `GITHUB_TOKEN` and optional `GITHUB_API_URL`.
    pub fn from_env() -> SelectorResult<Self> {
        Ok(Self {
            owner: required("OWNER")?,
            repo: required("REPO")?,
            token: required("GITHUB_TOKEN")?,
            api_url: env("GITHUB_API_URL", pr_gateway::GatewayConfig::DEFAULT_BASE_API),
        })
    }
}

/// PR numbers from `PR_NUMBERS` (comma list) or else `PR_NUMBER`.
/// Non-positive or unparsable entries are dropped.
pub fn pr_numbers_from_env() -> Vec<u64> {
    if let Ok(list) = std::env::var("PR_NUMBERS") {
        let prs = parse_pr_list(&list);
        if !prs.is_empty() {
            return prs;
        }
    }
    let single: i64 = parse("PR_NUMBER", 0);
    if single <= 0 {
        tracing::warn!(pr_number = single, "PR_NUMBER is not set to a positive value");
        return Vec::new();
    }
    vec![single as u64]
}

pub fn parse_pr_list(list: &str) -> Vec<u64> {
    list.split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pr_lists_leniently() {
        assert_eq!(parse_pr_list("1, 2,x,,0,15"), vec![1, 2, 15]);
        assert!(parse_pr_list("").is_empty());
    }

    #[test]
    fn regressor_kind_from_str() {
        assert_eq!("SGD".parse::<RegressorKind>().unwrap(), RegressorKind::Sgd);
        assert_eq!(" ridge ".parse::<RegressorKind>().unwrap(), RegressorKind::Ridge);
        assert!("forest".parse::<RegressorKind>().is_err());
    }

    #[test]
    fn defaults_map_into_component_configs() {
        let s = SelectorSettings::default();
        let cfg = s.selector_config();
        assert_eq!(cfg.policy.exploration_rounds, 2);
        assert_eq!(cfg.policy.epsilon, 0.0);
        assert_eq!(cfg.learner.min_samples_for_fit, 5);
        assert!(cfg.learner.reset_fit_on_failure);
        assert_eq!(s.orchestrator_config().autosave_every, 3);
        let run = s.run_options();
        assert_eq!(run.save_frequency, 5);
        assert_eq!(run.pause, Duration::from_secs(1));
        assert!(run.load_previous);
        assert!(matches!(s.build_regressor(), AnyRegressor::Sgd(_)));
    }

    #[test]
    fn github_settings_debug_hides_token() {
        let g = GitHubSettings {
            owner: "o".into(),
            repo: "r".into(),
            token: "ghp_secret".into(),
            api_url: "https://api.github.com".into(),
        };
        assert!(!format!("{g:?}").contains("ghp_secret"));
    }
}
