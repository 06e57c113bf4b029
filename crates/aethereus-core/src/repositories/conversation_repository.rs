use std::future::Future;
use std::pin::Pin;

use super::error::RepositoryResult;
use crate::models::{Conversation, ConversationDetail, ConversationId};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Repository trait for conversation storage.
///
/// Implemented by the remote backend (signed-in users) and by the local
/// anonymous store; `ConversationStore` picks one per call.
pub trait ConversationRepository: Send + Sync + 'static {
    /// Conversations without their message history, most recent first
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<Conversation>>>;

    /// Load a conversation with its messages; `None` when this backend does not hold it
    fn get(&self, id: &ConversationId)
    -> BoxFuture<'static, RepositoryResult<Option<ConversationDetail>>>;

    /// Delete a conversation and all of its messages
    fn remove(&self, id: &ConversationId) -> BoxFuture<'static, RepositoryResult<()>>;
}
