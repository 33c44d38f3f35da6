mod memory;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::models::chat::{ConversationContext, MessageRole, PromptMessage};

pub use memory::MemoryHistoryStore;

/// Per-conversation message history. Conversations are created lazily,
/// mutated only by appending, and live for the life of the process.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Returns the context for `conversation_id`, creating an empty one on
    /// first use.
    async fn get_or_create(&self, conversation_id: &str) -> ConversationContext;

    /// Validates `content` and appends it to the conversation's log.
    /// Duplicate appends produce duplicate entries; history is a log, not a
    /// set.
    async fn append(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), ServiceError>;

    /// At most the last `limit` messages in chronological order, in the
    /// plain pair form the inference server expects. Unknown ids read as
    /// empty without creating an entry; `limit == 0` returns the full log.
    async fn history(&self, conversation_id: &str, limit: usize) -> Vec<PromptMessage>;

    /// Removes the conversation entirely. No-op for unknown ids.
    async fn clear(&self, conversation_id: &str);
}
