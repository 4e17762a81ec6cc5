//! Provider-agnostic chat client.
//!
//! Callers hold one [`LlmClient`] and send `(system, prompt)` pairs without
//! caring which backend serves them. Dispatch is a plain enum match.

use tracing::info;

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::AiLlmError,
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

pub enum LlmClient {
    OpenAI(OpenAiService),
    Ollama(OllamaService),
}

impl LlmClient {
    /// Builds the backend matching `cfg.provider`.
    pub fn from_config(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        cfg.validate()?;
        let provider = cfg.provider;
        let client = match provider {
            LlmProvider::OpenAI => LlmClient::OpenAI(OpenAiService::new(cfg)?),
            LlmProvider::Ollama => LlmClient::Ollama(OllamaService::new(cfg)?),
        };
        info!(?provider, model = %client.model(), "LLM client ready");
        Ok(client)
    }

    pub fn model(&self) -> &str {
        match self {
            LlmClient::OpenAI(s) => s.model(),
            LlmClient::Ollama(s) => s.model(),
        }
    }

    /// Sends one system + user exchange and returns the model's text.
    pub async fn chat(&self, system: Option<&str>, prompt: &str) -> Result<String, AiLlmError> {
        match self {
            LlmClient::OpenAI(s) => s.chat(system, prompt).await,
            LlmClient::Ollama(s) => s.generate(system, prompt).await,
        }
    }
}
