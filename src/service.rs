use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::error;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::history::HistoryStore;
use crate::llm::util::extract_json_from_text;
use crate::llm::{GenerationOptions, LlmClient};
use crate::models::chat::{
    ChatChoice, ChatMessage, ChatRequest, ChatResponse, FinishReason, GenerationMetadata,
    LegacyChatMessage, LegacyChatRequest, LegacyChatResponse, MessageRole, PromptMessage,
};

/// Trailing history messages sent as model context per request.
const HISTORY_CONTEXT_LEN: usize = 10;

/// Model tag reported by the echo fallback.
pub const ECHO_MODEL_NAME: &str = "demo-echo-1";

/// Orchestrates validated chat requests across the conversation store and
/// the inference client. Both collaborators are injected at construction;
/// the service owns no global state.
pub struct ChatService {
    client: LlmClient,
    history: Arc<dyn HistoryStore>,
}

impl ChatService {
    pub fn new(client: LlmClient, history: Arc<dyn HistoryStore>) -> Self {
        Self { client, history }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    /// The main chat use case: record the user turn, assemble the context
    /// window, call the model, record the reply, and report timing.
    ///
    /// Errors from the store or the client propagate unmodified; no partial
    /// response is ever returned.
    pub async fn process_chat_request(
        &self,
        request: ChatRequest,
    ) -> Result<ChatResponse, ServiceError> {
        let started = Instant::now();

        let conversation_id = request
            .conversation_id
            .clone()
            .unwrap_or_else(|| format!("conv_{}", Uuid::new_v4()));

        self.history
            .append(&conversation_id, MessageRole::User, &request.message)
            .await?;

        let mut messages = self
            .history
            .history(&conversation_id, HISTORY_CONTEXT_LEN)
            .await;

        // The request's system prompt shapes this call only; it is never
        // written to the conversation log.
        if let Some(system_prompt) = &request.system_prompt {
            messages.insert(
                0,
                PromptMessage {
                    role: MessageRole::System,
                    content: system_prompt.clone(),
                },
            );
        }

        let config = self.client.config();
        let temperature = request.temperature.unwrap_or(config.temperature);
        let options = GenerationOptions {
            temperature,
            max_tokens: request.max_tokens.or(config.max_tokens),
        };

        let reply = self.client.chat(&messages, &options).await?;

        self.history
            .append(&conversation_id, MessageRole::Assistant, &reply)
            .await?;

        let generation_time_ms = started.elapsed().as_millis() as u64;

        let choice = ChatChoice {
            message: ChatMessage::new(MessageRole::Assistant, &reply)?,
            finish_reason: Some(FinishReason::Stop),
            index: 0,
        };
        let metadata =
            GenerationMetadata::new(self.client.model_name(), temperature, generation_time_ms);

        ChatResponse::new(Some(conversation_id), vec![choice], metadata)
    }

    /// Best-effort intent analysis of free-form input. Generation failures
    /// are folded into the envelope instead of failing the request.
    pub async fn analyze_input(&self, input: &str) -> JsonValue {
        let prompt = format!(
            "Analyze the following user input and provide structured analysis:\n\
             \n\
             User Input: \"{input}\"\n\
             \n\
             Please analyze:\n\
             1. Task type (question, request, command, creative, analysis)\n\
             2. Complexity level (simple, medium, complex)\n\
             3. Domain or subject area\n\
             4. Key concepts mentioned\n\
             5. Required knowledge areas\n\
             \n\
             Provide your analysis in a structured format."
        );

        let options = GenerationOptions::from(self.client.config());
        match self.client.generate(&prompt, None, &options).await {
            Ok(analysis) => json!({
                "analysis": analysis,
                "timestamp": Utc::now(),
            }),
            Err(err) => {
                error!("Error analyzing user input: {err}");
                json!({
                    "error": err.to_string(),
                    "timestamp": Utc::now(),
                })
            }
        }
    }

    /// Asks the model for output matching a caller-supplied schema. The
    /// reply is decoded best-effort; an undecodable reply is returned
    /// verbatim in a `parsed: false` wrapper rather than treated as a
    /// failure.
    pub async fn structured_output(
        &self,
        prompt: &str,
        schema: &JsonValue,
        system_prompt: Option<&str>,
    ) -> Result<JsonValue, ServiceError> {
        let instructions = system_prompt.unwrap_or("You are a helpful assistant.");
        let structured_prompt = format!(
            "{instructions}\n\
             \n\
             Please respond to the following prompt with output structured according to the \
             specified schema:\n\
             \n\
             Schema: {schema}\n\
             \n\
             Prompt: {prompt}\n\
             \n\
             Provide your response in valid JSON format that matches the schema."
        );

        let options = GenerationOptions::from(self.client.config());
        let reply = self.client.generate(&structured_prompt, None, &options).await?;

        match extract_json_from_text(&reply) {
            Some(value) => Ok(value),
            None => Ok(json!({
                "raw_response": reply,
                "parsed": false,
                "timestamp": Utc::now(),
            })),
        }
    }
}

/// Zero-dependency echo mode: wraps the untrimmed input in the minimal
/// response shape. No store access, no model call; it works with the
/// inference server down.
pub fn echo_response(request: &LegacyChatRequest) -> LegacyChatResponse {
    LegacyChatResponse {
        id: Uuid::new_v4().to_string(),
        model: ECHO_MODEL_NAME.to_string(),
        choices: vec![LegacyChatMessage {
            role: "assistant".to_string(),
            content: format!("Echo: {}", request.message),
        }],
    }
}
