//! Default LLM configs loaded from environment variables.
//!
//! [`config_from_env`] picks the backend from `LLM_KIND` and delegates to the
//! per-backend constructors below.
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`         = `groq` (default), `openai` or `ollama`
//! - `LLM_MODEL`        = model override
//! - `LLM_ENDPOINT`     = endpoint override (hosted backends)
//! - `LLM_TEMPERATURE`  = sampling temperature (default `0.25`)
//! - `LLM_MAX_TOKENS`   = optional max tokens (u32)
//! - `LLM_TIMEOUT_SECS` = request timeout (default `60`)
//!
//! Groq: `GROQ_API_KEY` (required). OpenAI: `OPENAI_API_KEY` (required).
//! Ollama: `OLLAMA_URL` or `OLLAMA_PORT`, and `OLLAMA_MODEL` unless `LLM_MODEL` is set.

use crate::{
    config::{
        llm_model_config::LlmModelConfig,
        llm_provider::{LlmKind, LlmProvider},
    },
    error_handler::{
        AiLlmError, ConfigError, env_opt_f32, env_opt_u32, env_opt_u64, must_env, opt_env,
        validate_http_endpoint,
    },
};

pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.25;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Builds the config selected by `LLM_KIND` (default `groq`).
///
/// # Errors
/// [`ConfigError::UnsupportedProvider`] for an unknown kind, plus whatever the
/// selected backend constructor reports.
pub fn config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let kind = match opt_env("LLM_KIND") {
        Some(v) => v.parse::<LlmKind>()?,
        None => LlmKind::default(),
    };
    match kind {
        LlmKind::Groq => config_groq(),
        LlmKind::OpenAI => config_openai(),
        LlmKind::Ollama => config_ollama(),
    }
}

/// Groq hosted models through the OpenAI-compatible API.
pub fn config_groq() -> Result<LlmModelConfig, AiLlmError> {
    hosted_config(GROQ_ENDPOINT, GROQ_DEFAULT_MODEL, "GROQ_API_KEY")
}

/// OpenAI hosted models.
pub fn config_openai() -> Result<LlmModelConfig, AiLlmError> {
    hosted_config(OPENAI_ENDPOINT, OPENAI_DEFAULT_MODEL, "OPENAI_API_KEY")
}

fn hosted_config(
    default_endpoint: &str,
    default_model: &str,
    key_var: &'static str,
) -> Result<LlmModelConfig, AiLlmError> {
    let api_key = must_env(key_var)?;
    let endpoint = opt_env("LLM_ENDPOINT").unwrap_or_else(|| default_endpoint.to_string());
    validate_http_endpoint("LLM_ENDPOINT", &endpoint)?;
    let model = opt_env("LLM_MODEL").unwrap_or_else(|| default_model.to_string());

    let cfg = LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE)),
        top_p: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Resolves the Ollama endpoint.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Some(url) = opt_env("OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = opt_env("OLLAMA_PORT") {
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{port}"));
    }
    Err(ConfigError::MissingVar("OLLAMA_URL or OLLAMA_PORT").into())
}

/// Local Ollama model. Longer default timeout, local generation is slow.
pub fn config_ollama() -> Result<LlmModelConfig, AiLlmError> {
    let endpoint = ollama_endpoint()?;
    let model = match opt_env("LLM_MODEL") {
        Some(m) => m,
        None => must_env("OLLAMA_MODEL")?,
    };

    let cfg = LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: Some(env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE)),
        top_p: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(600)),
    };
    cfg.validate()?;
    Ok(cfg)
}
