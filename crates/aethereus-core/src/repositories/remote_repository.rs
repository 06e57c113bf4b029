use std::future::Future;

use tracing::warn;

use super::conversation_repository::{BoxFuture, ConversationRepository};
use super::error::RepositoryResult;
use crate::api::ApiClient;
use crate::auth::TokenCache;
use crate::error::{ApiError, ApiResult};
use crate::models::{Conversation, ConversationDetail, ConversationId};

/// Server-side conversations of the signed-in user
#[derive(Clone)]
pub struct RemoteConversationRepository {
    client: ApiClient,
    tokens: TokenCache,
}

impl RemoteConversationRepository {
    pub fn new(client: ApiClient, tokens: TokenCache) -> Self {
        Self { client, tokens }
    }

    /// Run `call` with a bearer token, refreshing the token and retrying
    /// once if the server answers 401
    async fn with_token<T, F, Fut>(&self, call: F) -> ApiResult<T>
    where
        F: Fn(ApiClient, String) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let token = self
            .tokens
            .get_token()
            .await
            .map_err(|e| ApiError::Token(e.to_string()))?;

        match call(self.client.clone(), token).await {
            Err(ApiError::Status { status: 401, .. }) => {
                warn!("Identity token rejected, refreshing and retrying");
                let token = self
                    .tokens
                    .refresh_token()
                    .await
                    .map_err(|e| ApiError::Token(e.to_string()))?;
                call(self.client.clone(), token).await
            }
            other => other,
        }
    }
}

impl ConversationRepository for RemoteConversationRepository {
    fn list(&self) -> BoxFuture<'static, RepositoryResult<Vec<Conversation>>> {
        let repo = self.clone();
        Box::pin(async move {
            let conversations = repo
                .with_token(|client, token| async move { client.list_conversations(&token).await })
                .await?;
            Ok(conversations)
        })
    }

    fn get(&self, id: &ConversationId) -> BoxFuture<'static, RepositoryResult<Option<ConversationDetail>>> {
        let repo = self.clone();
        let id = id.clone();
        Box::pin(async move {
            let ConversationId::Remote(id) = id else {
                return Ok(None);
            };

            let result = repo
                .with_token(|client, token| async move { client.get_conversation(id, &token).await })
                .await;
            match result {
                Ok(detail) => Ok(Some(detail)),
                Err(ApiError::Status { status: 404, .. }) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn remove(&self, id: &ConversationId) -> BoxFuture<'static, RepositoryResult<()>> {
        let repo = self.clone();
        let id = id.clone();
        Box::pin(async move {
            let ConversationId::Remote(id) = id else {
                return Ok(());
            };

            repo.with_token(|client, token| async move { client.delete_conversation(id, &token).await })
                .await?;
            Ok(())
        })
    }
}
