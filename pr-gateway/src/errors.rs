//! Error hierarchy for pr-gateway.
//!
//! - Single root [`GatewayError`] for all public functions.
//! - Status-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - `From` impls so `?` works directly on `reqwest` and `serde_json` results.

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// GitHub API failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Missing token, malformed base URL and similar setup problems.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bad input such as a zero PR number or an empty comment body.
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 401.
    #[error("unauthorized")]
    Unauthorized,

    /// HTTP 403.
    #[error("forbidden")]
    Forbidden,

    /// HTTP 404.
    #[error("not found")]
    NotFound,

    /// HTTP 429, with the `Retry-After` value when the server sent one.
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 5xx.
    #[error("server error: status {0}")]
    Server(u16),

    /// Any other unexpected status.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    #[error("timeout")]
    Timeout,

    /// Transport failure without a status (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Response parsed but lacks a field we need (e.g. `diff_url`).
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing GitHub token")]
    MissingToken,

    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    #[error("missing repository coordinate: {0}")]
    MissingRepo(&'static str),
}

impl ProviderError {
    /// Maps a non-success status code to a provider error.
    pub fn from_status(code: u16, retry_after_secs: Option<u64>) -> Self {
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::Forbidden,
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited { retry_after_secs },
            500..=599 => ProviderError::Server(code),
            _ => ProviderError::HttpStatus(code),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            return ProviderError::from_status(status.as_u16(), None);
        }
        ProviderError::Network(e.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Provider(ProviderError::from(e))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Provider(ProviderError::Serde(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(ProviderError::from_status(401, None), ProviderError::Unauthorized));
        assert!(matches!(ProviderError::from_status(404, None), ProviderError::NotFound));
        assert!(matches!(
            ProviderError::from_status(429, Some(7)),
            ProviderError::RateLimited { retry_after_secs: Some(7) }
        ));
        assert!(matches!(ProviderError::from_status(502, None), ProviderError::Server(502)));
        assert!(matches!(ProviderError::from_status(418, None), ProviderError::HttpStatus(418)));
    }
}
