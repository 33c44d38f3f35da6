use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::error::{ServiceError, ValidationIssue};

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 4096);

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// A stored conversation turn. Content is trimmed on construction and is
/// never empty; build these through [`ChatMessage::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: &str) -> Result<Self, ServiceError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::single_issue(
                "content",
                "must not be empty after trimming",
                json!(content),
            ));
        }
        Ok(Self {
            role,
            content: trimmed.to_string(),
            timestamp: Utc::now(),
        })
    }
}

/// The plain role/content pair shape the inference server expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<&ChatMessage> for PromptMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Per-conversation state: an append-only message log plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: HashMap<String, JsonValue>,
}

impl ConversationContext {
    pub fn new(conversation_id: &str) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Last `limit` messages in chronological order; `limit == 0` means the
    /// whole log.
    pub fn recent_messages(&self, limit: usize) -> &[ChatMessage] {
        if limit == 0 || limit >= self.messages.len() {
            &self.messages
        } else {
            &self.messages[self.messages.len() - limit..]
        }
    }

    pub fn to_prompt_messages(&self, limit: usize) -> Vec<PromptMessage> {
        self.recent_messages(limit)
            .iter()
            .map(PromptMessage::from)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Checks every field constraint, collecting all violations, and returns
    /// the normalized (trimmed) request. Pure; no I/O.
    pub fn validated(mut self) -> Result<Self, ServiceError> {
        let mut issues = Vec::new();

        let trimmed = self.message.trim().to_string();
        if trimmed.is_empty() {
            issues.push(ValidationIssue::new(
                "message",
                "must not be empty after trimming",
                json!(self.message),
            ));
        }

        if let Some(temperature) = self.temperature {
            let (temp_min, temp_max) = TEMPERATURE_RANGE;
            if !(temp_min..=temp_max).contains(&temperature) {
                issues.push(ValidationIssue::new(
                    "temperature",
                    format!("must be within [{:.1}, {:.1}]", temp_min, temp_max),
                    json!(temperature),
                ));
            }
        }

        if let Some(max_tokens) = self.max_tokens {
            let (tokens_min, tokens_max) = MAX_TOKENS_RANGE;
            if !(tokens_min..=tokens_max).contains(&max_tokens) {
                issues.push(ValidationIssue::new(
                    "max_tokens",
                    format!("must be within [{}, {}]", tokens_min, tokens_max),
                    json!(max_tokens),
                ));
            }
        }

        if !issues.is_empty() {
            return Err(ServiceError::Validation(issues));
        }

        self.message = trimmed;
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model_name: String,
    pub temperature: f32,
    pub tokens_used: Option<u32>,
    pub generation_time_ms: Option<u64>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

impl GenerationMetadata {
    pub fn new(model_name: &str, temperature: f32, generation_time_ms: u64) -> Self {
        Self {
            model_name: model_name.to_string(),
            temperature,
            tokens_used: None,
            generation_time_ms: Some(generation_time_ms),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub conversation_id: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub metadata: GenerationMetadata,
    pub created: DateTime<Utc>,
}

impl ChatResponse {
    pub fn new(
        conversation_id: Option<String>,
        choices: Vec<ChatChoice>,
        metadata: GenerationMetadata,
    ) -> Result<Self, ServiceError> {
        if choices.is_empty() {
            return Err(ServiceError::single_issue(
                "choices",
                "must contain at least one entry",
                json!([]),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            choices,
            metadata,
            created: Utc::now(),
        })
    }
}

/// Uniform failure shape at the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub details: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error_type: error_type.to_string(),
            message: message.to_string(),
            details: None,
            timestamp: Utc::now(),
            request_id: None,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

// Minimal request/response shapes for the legacy echo endpoint. These are
// deliberately loose: the echo path does no trimming or role checking.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyChatResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<LegacyChatMessage>,
}
