pub mod client;
pub mod util;

use std::time::Duration;

use serde_json::json;
use url::Url;

use crate::error::ServiceError;

pub use client::LlmClient;

/// Connection and generation defaults for the inference server.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the inference server, without a trailing slash.
    pub base_url: String,
    pub model_name: String,
    /// Applied to every remote call; exceeding it surfaces as a transport
    /// error.
    pub timeout: Duration,
    pub temperature: f32,
    /// Maximum-token bound attached to requests when configured. `None`
    /// means no bound at all, not a bound of zero.
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model_name: "gpt-oss:latest".to_string(),
            timeout: Duration::from_secs(300),
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    /// Validates and normalizes `base_url` (http/https only, trailing slash
    /// stripped).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ServiceError> {
        let parsed = Url::parse(base_url).map_err(|err| {
            ServiceError::single_issue("base_url", err.to_string(), json!(base_url))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ServiceError::single_issue(
                "base_url",
                "must start with http:// or https://",
                json!(base_url),
            ));
        }
        self.base_url = base_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}

/// Per-call generation knobs, resolved from the request with config
/// fallbacks before they reach the client.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl From<&LlmConfig> for GenerationOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}
