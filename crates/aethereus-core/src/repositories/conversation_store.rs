use std::sync::Arc;

use tracing::debug;

use super::anonymous_repository::AnonymousConversationRepository;
use super::conversation_repository::ConversationRepository;
use super::error::{RepositoryError, RepositoryResult};
use super::key_value_store::KeyValueStore;
use super::remote_repository::RemoteConversationRepository;
use crate::api::ApiClient;
use crate::auth::TokenCache;
use crate::models::{Conversation, ConversationDetail, ConversationId, Message};

/// Conversation storage for the current caller.
///
/// Signed-in users list the remote store; users without identity list the
/// local anonymous store. Lookups and deletes try local storage first since
/// `anon_` ids never collide with server ids.
pub struct ConversationStore {
    client: ApiClient,
    local: AnonymousConversationRepository,
    remote: Option<RemoteConversationRepository>,
    identity: Option<TokenCache>,
}

impl ConversationStore {
    pub fn new(client: ApiClient, local_store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client,
            local: AnonymousConversationRepository::new(local_store),
            remote: None,
            identity: None,
        }
    }

    /// Sign in (`Some`) or out (`None`)
    pub fn set_identity(&mut self, identity: Option<TokenCache>) {
        self.remote = identity
            .clone()
            .map(|tokens| RemoteConversationRepository::new(self.client.clone(), tokens));
        self.identity = identity;
        debug!(signed_in = self.identity.is_some(), "Conversation store identity changed");
    }

    pub fn identity(&self) -> Option<&TokenCache> {
        self.identity.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    fn remote(&self) -> RepositoryResult<&RemoteConversationRepository> {
        self.remote.as_ref().ok_or(RepositoryError::AuthRequired)
    }

    /// Conversation list for the current caller, most recent first
    pub async fn list(&self) -> RepositoryResult<Vec<Conversation>> {
        match &self.remote {
            Some(remote) => remote.list().await,
            None => self.local.list().await,
        }
    }

    pub async fn get(&self, id: &ConversationId) -> RepositoryResult<Option<ConversationDetail>> {
        if let Some(detail) = self.local.get(id).await? {
            return Ok(Some(detail));
        }
        match id {
            ConversationId::Local(_) => Ok(None),
            ConversationId::Remote(_) => self.remote()?.get(id).await,
        }
    }

    pub async fn remove(&self, id: &ConversationId) -> RepositoryResult<()> {
        match id {
            ConversationId::Local(_) => self.local.remove(id).await,
            ConversationId::Remote(_) => self.remote()?.remove(id).await,
        }
    }

    /// Persist a finished anonymous exchange; returns the local list, head first
    pub async fn append_anonymous_exchange(
        &self,
        user: Message,
        assistant: Message,
        ai_model: &str,
    ) -> RepositoryResult<Vec<Conversation>> {
        self.local.append_exchange(user, assistant, ai_model).await
    }
}
