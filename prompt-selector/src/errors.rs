//! Crate-wide error hierarchy for prompt-selector.
//!
//! - Single root [`Error`] for fallible public functions.
//! - Upstream failures (GitHub, LLM) wrap the sibling crates' errors unchanged.
//! - Meta-evaluation has its own [`MetaEvalError`]; it is folded into a neutral
//!   score by the evaluator and never surfaces through [`Error`].

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type SelectorResult<T> = Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Diff fetch / comment post failure.
    #[error(transparent)]
    Gateway(#[from] pr_gateway::GatewayError),

    /// Review generation failure.
    #[error(transparent)]
    Llm(#[from] ai_llm_service::AiLlmError),

    /// Scaler or regressor failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// State or artifact file I/O.
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Bad or missing environment configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input validation errors (unknown prompt name, empty registry, etc.).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("other error: {0}")]
    Other(String),
}

/// Numeric failures from the scaler and regressors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model is not fitted")]
    NotFitted,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("sample/target length mismatch: {samples} rows vs {targets} targets")]
    LengthMismatch { samples: usize, targets: usize },

    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("training diverged after {epochs} epochs")]
    Diverged { epochs: usize },

    #[error("singular system in ridge solve")]
    Singular,
}

/// State file and artifact store failures.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Payload parsed but violates the state layout (lengths, indices, dims).
    #[error("invalid state: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value in {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Why an LLM judgement could not be turned into [`crate::scoring::MetaScores`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaEvalError {
    /// The judge call itself failed.
    #[error("judge call failed: {0}")]
    Upstream(String),

    /// The judge answered but no JSON object could be extracted.
    #[error("unparseable judge output: {0}")]
    Parse(String),

    /// JSON was found but a sub-score is absent or not a number.
    #[error("missing or invalid field `{0}` in judge output")]
    Field(&'static str),
}

// ===== Conversions for `?` ergonomics =====

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persist(PersistError::Io(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persist(PersistError::Serde(e))
    }
}
