use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::HistoryStore;
use crate::error::ServiceError;
use crate::models::chat::{ChatMessage, ConversationContext, MessageRole, PromptMessage};

/// In-process conversation store. State is scoped to the store instance and
/// lost on restart; there is no persistence layer behind it.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    conversations: Mutex<HashMap<String, ConversationContext>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn get_or_create(&self, conversation_id: &str) -> ConversationContext {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationContext::new(conversation_id))
            .clone()
    }

    async fn append(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), ServiceError> {
        // Validate before taking the entry so a rejected message never
        // creates an empty conversation.
        let message = ChatMessage::new(role, content)?;
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| ConversationContext::new(conversation_id))
            .add_message(message);
        Ok(())
    }

    async fn history(&self, conversation_id: &str, limit: usize) -> Vec<PromptMessage> {
        let conversations = self.conversations.lock().await;
        match conversations.get(conversation_id) {
            Some(context) => context.to_prompt_messages(limit),
            None => Vec::new(),
        }
    }

    async fn clear(&self, conversation_id: &str) {
        let mut conversations = self.conversations.lock().await;
        conversations.remove(conversation_id);
    }
}
