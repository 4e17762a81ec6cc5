use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{ConfigError, Result, validate_http_endpoint, validate_range_f32};

/// Configuration for a single LLM model invocation target.
///
/// - `provider`: wire protocol (OpenAI-compatible or Ollama).
/// - `model`: model identifier (e.g., `"llama-3.3-70b-versatile"`).
/// - `endpoint`: base URL without the API path (e.g., `https://api.groq.com/openai`).
/// - `api_key`: bearer token for hosted providers.
/// - `max_tokens` / `temperature` / `top_p`: sampling options, sent only when set.
/// - `timeout_secs`: request timeout; services default to 60 seconds.
#[derive(Debug, Clone)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_secs: Option<u64>,
}

impl LlmModelConfig {
    /// Checks the fields that can be validated without a network call.
    ///
    /// # Errors
    /// [`ConfigError::EmptyModel`], [`ConfigError::InvalidFormat`] for a non-HTTP
    /// endpoint, [`ConfigError::OutOfRange`] for temperature outside `[0, 2]` or
    /// top_p outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
        validate_http_endpoint("LLM_ENDPOINT", &self.endpoint)?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        Ok(())
    }

    /// Returns a copy with a different sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "llama-3.3-70b-versatile".into(),
            endpoint: "https://api.groq.com/openai".into(),
            api_key: Some("k".into()),
            max_tokens: None,
            temperature: Some(0.25),
            top_p: None,
            timeout_secs: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(cfg().validate().is_ok());
    }

    #[test]
    fn rejects_bad_fields() {
        let mut c = cfg();
        c.model = " ".into();
        assert!(c.validate().is_err());

        let c = cfg().with_temperature(3.0);
        assert!(c.validate().is_err());

        let mut c = cfg();
        c.endpoint = "api.groq.com".into();
        assert!(c.validate().is_err());
    }
}
