//! Ollama client for local text generation.
//!
//! - `POST {endpoint}/api/generate` with `stream=false`
//!
//! The system message, when present, is passed through Ollama's `system` field
//! so the same prompt templates work against hosted and local models.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{
    AiLlmError, HttpError, Provider, ProviderError, ProviderErrorKind, make_snippet,
};

pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is not an http(s) URL
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(Provider::Ollama, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.unwrap_or(60)))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(AiLlmError::HttpTransport)?;

        let url_generate = format!("{}/api/generate", endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            cfg,
            url_generate,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Non-streaming generation via `/api/generate`.
    ///
    /// Mapped options: `num_predict` ← `max_tokens`, plus `temperature` and `top_p`.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn generate(&self, system: Option<&str>, prompt: &str) -> Result<String, AiLlmError> {
        let body = GenerateRequest {
            model: &self.cfg.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: self.cfg.temperature,
                top_p: self.cfg.top_p,
                num_predict: self.cfg.max_tokens,
            },
        };

        debug!(prompt_len = prompt.len(), "POST {}", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::HttpStatus(HttpError {
                    status,
                    url: self.url_generate.clone(),
                    snippet: make_snippet(&text),
                }),
            )
            .into());
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::Decode(format!(
                    "serde error: {e}; ensure `stream=false` is used"
                )),
            )
        })?;

        Ok(out.response)
    }
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn generate_passes_system_and_disables_streaming() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "qwen3:14b",
                "system": "sys",
                "stream": false
            })))
            .with_status(200)
            .with_body(r#"{"response":"ok","done":true}"#)
            .create_async()
            .await;

        let svc = OllamaService::new(LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "qwen3:14b".into(),
            endpoint: server.url(),
            api_key: None,
            max_tokens: Some(64),
            temperature: Some(0.25),
            top_p: None,
            timeout_secs: Some(5),
        })
        .unwrap();

        assert_eq!(svc.generate(Some("sys"), "hello").await.unwrap(), "ok");
        mock.assert_async().await;
    }
}
