use futures::StreamExt;
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::{GenerationOptions, LlmConfig};
use crate::error::ServiceError;
use crate::models::chat::PromptMessage;

/// Client for the inference server's generate/chat/tags endpoints.
///
/// Holds one pooled HTTP client for its whole lifetime; connections are
/// released when the service owning it is dropped at shutdown.
#[derive(Debug)]
pub struct LlmClient {
    http: HttpClient,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ModelOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl From<&GenerationOptions> for ModelOptions {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ModelOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Serialize)]
struct ChatRequestPayload<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
    options: ModelOptions,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: Option<ChatReplyMessage>,
}

#[derive(Deserialize)]
struct StreamLine {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct ModelTag {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, ServiceError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        &self.config.model_name
    }

    /// Single-turn generation. NDJSON bodies (streamed generate) are
    /// concatenated line by line in arrival order.
    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let payload = GenerateRequest {
            model: &self.config.model_name,
            prompt,
            stream: false,
            options: options.into(),
            system: system_prompt,
        };

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let is_ndjson = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/x-ndjson"))
            .unwrap_or(false);

        if is_ndjson {
            return self.collect_ndjson(response).await;
        }

        let data: GenerateResponse = response.json().await?;
        Ok(data.response)
    }

    /// Multi-turn chat. The reply text lives in the response's nested
    /// `message.content`; an absent field reads as empty.
    pub async fn chat(
        &self,
        messages: &[PromptMessage],
        options: &GenerationOptions,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/api/chat", self.config.base_url);
        let payload = ChatRequestPayload {
            model: &self.config.model_name,
            messages,
            stream: false,
            options: options.into(),
        };

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let data: ChatReply = response.json().await?;
        Ok(data.message.map(|message| message.content).unwrap_or_default())
    }

    /// Lightweight liveness probe: lists the server's models and checks the
    /// configured one is present. Never errs; any failure reads as false.
    pub async fn health_check(&self) -> bool {
        match self.try_health_check().await {
            Ok(healthy) => healthy,
            Err(err) => {
                warn!("Health check failed: {err}");
                false
            }
        }
    }

    async fn try_health_check(&self) -> Result<bool, ServiceError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let data: TagsResponse = response.json().await?;
        Ok(data
            .models
            .iter()
            .any(|model| model.name == self.config.model_name))
    }

    async fn collect_ndjson(&self, response: reqwest::Response) -> Result<String, ServiceError> {
        let mut stream = response.bytes_stream();
        let mut pending = String::new();
        let mut output = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            // Lines can straddle chunk boundaries; only consume complete ones.
            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                append_stream_line(line.trim(), &mut output);
            }
        }
        append_stream_line(pending.trim(), &mut output);

        Ok(output)
    }
}

fn append_stream_line(line: &str, output: &mut String) {
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<StreamLine>(line) {
        Ok(parsed) => output.push_str(&parsed.response),
        Err(err) => debug!("Skipping undecodable stream line: {err}"),
    }
}
