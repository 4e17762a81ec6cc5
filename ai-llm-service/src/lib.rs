//! LLM provider clients used for review generation and review judging.
//!
//! - [`config`]: model configs and env-driven defaults (`LLM_KIND`)
//! - [`services`]: OpenAI-compatible and Ollama HTTP clients
//! - [`llm_client::LlmClient`]: enum dispatch over the two
//! - [`error_handler`]: unified [`AiLlmError`]

pub mod config;
pub mod error_handler;
pub mod llm_client;
pub mod services;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::{LlmKind, LlmProvider};
pub use error_handler::{AiLlmError, Result};
pub use llm_client::LlmClient;
