use std::sync::Arc;

use tracing::{debug, warn};

use super::conversation_repository::{BoxFuture, ConversationRepository};
use super::error::RepositoryResult;
use super::key_value_store::KeyValueStore;
use crate::models::{Conversation, ConversationDetail, ConversationId, Message};
use crate::services::derive_title;

/// Slot holding every anonymous conversation as one JSON array
pub const ANONYMOUS_CONVERSATIONS_KEY: &str = "anonymous_conversations";

/// Conversations of a user without identity, kept on this device.
///
/// At most one conversation exists per model; new exchanges under that
/// model are appended to it and the thread moves to the head of the list.
#[derive(Clone)]
pub struct AnonymousConversationRepository {
    store: Arc<dyn KeyValueStore>,
}

impl AnonymousConversationRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Every stored conversation with its messages, head first.
    /// A corrupt slot is logged and read as empty.
    pub async fn load(&self) -> RepositoryResult<Vec<Conversation>> {
        let Some(raw) = self.store.get(ANONYMOUS_CONVERSATIONS_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(conversations) => Ok(conversations),
            Err(e) => {
                warn!(error = ?e, "Anonymous conversations are unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    pub async fn save(&self, conversations: &[Conversation]) -> RepositoryResult<()> {
        let json = serde_json::to_string(conversations)?;
        self.store.set(ANONYMOUS_CONVERSATIONS_KEY, json).await
    }

    /// Persist one finished exchange into the model's thread and return the
    /// updated list, head first
    pub async fn append_exchange(
        &self,
        user: Message,
        assistant: Message,
        ai_model: &str,
    ) -> RepositoryResult<Vec<Conversation>> {
        let mut conversations = self.load().await?;

        let mut thread = match conversations.iter().position(|c| c.ai_model == ai_model) {
            Some(index) => conversations.remove(index),
            None => {
                let conversation = Conversation::new_anonymous(derive_title(&user.content), ai_model);
                debug!(conversation_id = %conversation.id, model = ai_model, "New anonymous conversation");
                conversation
            }
        };

        thread.push_messages([user, assistant]);
        conversations.insert(0, thread);

        self.save(&conversations).await?;
        Ok(conversations)
    }

    /// Remove a conversation, returning what is left
    pub async fn delete(&self, id: &ConversationId) -> RepositoryResult<Vec<Conversation>> {
        let mut conversations = self.load().await?;
        conversations.retain(|c| &c.id != id);
        self.save(&conversations).await?;
        Ok(conversations)
    }

    pub async fn find(&self, id: &ConversationId) -> RepositoryResult<Option<Conversation>> {
        if !id.is_local() {
            return Ok(None);
        }
        Ok(self.load().await?.into_iter().find(|c| &c.id == id))
    }
}

impl ConversationRepository for AnonymousConversationRepository {
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<Conversation>>> {
        let repo = self.clone();
        Box::pin(async move {
            let conversations = repo.load().await?;
            Ok(conversations.iter().map(Conversation::summary).collect())
        })
    }

    fn get(&self, id: &ConversationId) -> BoxFuture<'static, RepositoryResult<Option<ConversationDetail>>> {
        let repo = self.clone();
        let id = id.clone();
        Box::pin(async move {
            Ok(repo.find(&id).await?.map(|mut conversation| {
                let messages = std::mem::take(&mut conversation.messages);
                ConversationDetail {
                    conversation,
                    messages,
                }
            }))
        })
    }

    fn remove(&self, id: &ConversationId) -> BoxFuture<'static, RepositoryResult<()>> {
        let repo = self.clone();
        let id = id.clone();
        Box::pin(async move {
            repo.delete(&id).await?;
            Ok(())
        })
    }
}
