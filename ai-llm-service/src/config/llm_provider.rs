use std::fmt;
use std::str::FromStr;

use crate::error_handler::ConfigError;

/// Wire protocol used to talk to a model backend.
///
/// Groq exposes an OpenAI-compatible API, so it is served by [`LlmProvider::OpenAI`]
/// with a different endpoint; see [`LlmKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local Ollama runtime (`/api/generate`).
    Ollama,
    /// OpenAI-compatible chat completions (`/v1/chat/completions`).
    OpenAI,
}

/// Value of `LLM_KIND`: which hosted or local backend to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LlmKind {
    #[default]
    Groq,
    OpenAI,
    Ollama,
}

impl LlmKind {
    /// Protocol spoken by this backend.
    pub fn provider(self) -> LlmProvider {
        match self {
            LlmKind::Groq | LlmKind::OpenAI => LlmProvider::OpenAI,
            LlmKind::Ollama => LlmProvider::Ollama,
        }
    }
}

impl FromStr for LlmKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(LlmKind::Groq),
            "openai" | "chatgpt" => Ok(LlmKind::OpenAI),
            "ollama" => Ok(LlmKind::Ollama),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for LlmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LlmKind::Groq => "groq",
            LlmKind::OpenAI => "openai",
            LlmKind::Ollama => "ollama",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds() {
        assert_eq!("GROQ".parse::<LlmKind>().unwrap(), LlmKind::Groq);
        assert_eq!(" openai ".parse::<LlmKind>().unwrap(), LlmKind::OpenAI);
        assert_eq!("ollama".parse::<LlmKind>().unwrap(), LlmKind::Ollama);
        assert!("anthropic".parse::<LlmKind>().is_err());
    }

    #[test]
    fn groq_speaks_openai_protocol() {
        assert_eq!(LlmKind::Groq.provider(), LlmProvider::OpenAI);
        assert_eq!(LlmKind::Ollama.provider(), LlmProvider::Ollama);
    }
}
