use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cancel_handle::CancelHandle;
use super::events::SessionEvent;
use super::exchange_state::{ExchangeOutcome, ExchangeState};
use crate::api::{ApiClient, ChatRequest, ChatTransport, UploadFile};
use crate::auth::TokenCache;
use crate::config::{DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Conversation, ConversationId, ConversationsModel, GeneratedImage, Message, MessageId,
    MessageKind,
};
use crate::repositories::{ConversationStore, RepositoryResult};
use crate::services::image_service::{build_image_request, image_failure_text};
use crate::services::{IMAGE_PLACEHOLDER, StreamChunk, decode_chat_stream, derive_title, image_markdown};

/// Assistant text after a failed chat exchange
pub const CHAT_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// One user's chat session: the visible message list, the conversation
/// list, the image gallery and the exchange state machine.
///
/// All collaborators are passed in; nothing is read from ambient state.
pub struct ChatSession {
    client: ApiClient,
    transport: Arc<dyn ChatTransport>,
    store: ConversationStore,
    conversations: ConversationsModel,
    messages: Vec<Message>,
    gallery: Vec<GeneratedImage>,
    chat_model: String,
    image_model: String,
    state: ExchangeState,
    cancel: CancelHandle,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    /// Set when the receiver was dropped during the current exchange
    events_gone: bool,
}

impl ChatSession {
    pub fn new(client: ApiClient, store: ConversationStore) -> Self {
        Self {
            transport: Arc::new(client.clone()),
            client,
            store,
            conversations: ConversationsModel::new(),
            messages: Vec::new(),
            gallery: Vec::new(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            state: ExchangeState::Idle,
            cancel: CancelHandle::new(),
            events: None,
            events_gone: false,
        }
    }

    /// Replace the streaming transport (the default is the HTTP client)
    pub fn with_transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_models(mut self, chat_model: impl Into<String>, image_model: impl Into<String>) -> Self {
        self.chat_model = chat_model.into();
        self.image_model = image_model.into();
        self
    }

    /// Receive `SessionEvent`s. Dropping the receiver while a reply streams
    /// stops the stream.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        self.events_gone = false;
        rx
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn conversations(&self) -> &ConversationsModel {
        &self.conversations
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.conversations.active()
    }

    pub fn gallery(&self) -> &[GeneratedImage] {
        &self.gallery
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    /// Model for new conversations; existing ones keep theirs
    pub fn set_chat_model(&mut self, model: impl Into<String>) {
        self.chat_model = model.into();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.is_signed_in()
    }

    /// Sign in (`Some`) or out (`None`). Signing out clears the gallery.
    pub fn set_identity(&mut self, identity: Option<TokenCache>) {
        let signed_out = identity.is_none();
        self.store.set_identity(identity);
        if signed_out && !self.gallery.is_empty() {
            self.gallery.clear();
            self.emit(SessionEvent::GalleryChanged);
        }
    }

    /// Send a chat message and stream the reply into an assistant placeholder.
    ///
    /// Failures never escape: they end up as text in the assistant slot and
    /// in the returned outcome.
    pub async fn send_message(&mut self, text: &str, attachment_url: Option<String>) -> ExchangeOutcome {
        let attachment_url = attachment_url.filter(|url| !url.trim().is_empty());
        if text.trim().is_empty() && attachment_url.is_none() {
            debug!("Ignoring empty message without attachment");
            return ExchangeOutcome::Skipped;
        }

        let cancel = self.cancel.fresh();
        self.events_gone = false;
        self.transition(ExchangeState::Submitting);

        let user_message = Message::user(text, attachment_url.clone());
        self.append_message(user_message.clone());
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        self.append_message(placeholder);

        let conversation_id = self.outgoing_conversation_id();
        let request = ChatRequest {
            conversation_id,
            content: text.to_string(),
            ai_model: self.chat_model.clone(),
            image_url: attachment_url,
        };

        let result = self.run_exchange(request, &placeholder_id, &user_message.content, cancel).await;

        let outcome = match result {
            Ok(()) => {
                self.transition(ExchangeState::Completed);
                ExchangeOutcome::Completed
            }
            Err(ApiError::Cancelled) => {
                info!(conversation_id, "Exchange cancelled, nothing persisted");
                self.transition(ExchangeState::Cancelled);
                self.transition(ExchangeState::Idle);
                return ExchangeOutcome::Cancelled;
            }
            Err(e) => {
                error!(conversation_id, error = ?e, "Chat exchange failed");
                self.update_message(&placeholder_id, |m| m.content = CHAT_ERROR_MESSAGE.to_string());
                self.transition(ExchangeState::Failed);
                ExchangeOutcome::Failed
            }
        };

        let assistant_message = self
            .messages
            .iter()
            .find(|m| m.id == placeholder_id)
            .cloned()
            .unwrap_or_else(|| Message::assistant(CHAT_ERROR_MESSAGE));
        self.persist_exchange(user_message, assistant_message).await;

        self.transition(ExchangeState::Idle);
        outcome
    }

    /// Upload `file` and send it with `text`. A failed upload is logged and
    /// the message goes out without the attachment.
    pub async fn send_with_file(&mut self, text: &str, file: UploadFile) -> ExchangeOutcome {
        let attachment_url = match self.upload_file(file).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = ?e, "File upload failed, sending without attachment");
                None
            }
        };
        self.send_message(text, attachment_url).await
    }

    /// Upload a file ahead of a message; returns its URL
    pub async fn upload_file(&self, file: UploadFile) -> ApiResult<String> {
        let token = self.resolve_token().await?;
        self.client.upload_image(file, token.as_deref()).await
    }

    /// Generate an image from `prompt`. Requires a signed-in user.
    pub async fn generate_image(&mut self, prompt: &str) -> ExchangeOutcome {
        if prompt.trim().is_empty() {
            debug!("Ignoring empty image prompt");
            return ExchangeOutcome::Skipped;
        }

        self.transition(ExchangeState::Submitting);

        self.append_message(Message::user(prompt, None));
        let placeholder = Message::assistant(IMAGE_PLACEHOLDER);
        let placeholder_id = placeholder.id.clone();
        self.append_message(placeholder);

        let outcome = match self.request_image(prompt).await {
            Ok(image) => {
                let markdown = image_markdown(prompt, &image.image_url);
                self.update_message(&placeholder_id, |m| {
                    m.content = markdown;
                    m.kind = MessageKind::Image;
                });

                if let Some(conversation_id) = image.conversation_id {
                    self.link_image_conversation(conversation_id, prompt).await;
                }

                info!(url = %image.image_url, "Image generated");
                self.gallery.insert(0, image);
                self.emit(SessionEvent::GalleryChanged);
                self.transition(ExchangeState::Completed);
                ExchangeOutcome::Completed
            }
            Err(e) => {
                error!(error = ?e, "Image generation failed");
                let text = image_failure_text(&e);
                self.update_message(&placeholder_id, |m| m.content = text);
                self.transition(ExchangeState::Failed);
                ExchangeOutcome::Failed
            }
        };

        self.transition(ExchangeState::Idle);
        outcome
    }

    /// Load the signed-in user's gallery; no-op without identity
    pub async fn load_images(&mut self) -> ApiResult<()> {
        let Some(identity) = self.store.identity() else {
            return Ok(());
        };
        let token = identity
            .get_token()
            .await
            .map_err(|e| ApiError::Token(e.to_string()))?;

        self.gallery = self.client.list_images(&token).await?;
        debug!(count = self.gallery.len(), "Gallery loaded");
        self.emit(SessionEvent::GalleryChanged);
        Ok(())
    }

    /// Refresh the conversation list from the caller's backend
    pub async fn load_conversations(&mut self) -> RepositoryResult<()> {
        let conversations = self.store.list().await?;
        debug!(count = conversations.len(), "Conversations loaded");
        self.conversations.replace_all(conversations);
        self.emit(SessionEvent::ConversationsChanged);
        Ok(())
    }

    /// Open a conversation and show its messages. Returns `false` when no
    /// backend knows the id.
    pub async fn select_conversation(&mut self, id: &ConversationId) -> RepositoryResult<bool> {
        let Some(detail) = self.store.get(id).await? else {
            warn!(conversation_id = %id, "Conversation not found");
            return Ok(false);
        };

        self.cancel.cancel();
        self.conversations.set_active(detail.conversation);
        self.messages = detail.messages;
        self.emit(SessionEvent::ActiveConversationChanged(Some(id.clone())));
        self.emit(SessionEvent::MessagesReset);
        Ok(true)
    }

    /// Leave the active conversation; the next message starts a new one
    pub fn start_new_conversation(&mut self) {
        self.cancel.cancel();
        self.conversations.clear_active();
        self.messages.clear();
        self.emit(SessionEvent::ActiveConversationChanged(None));
        self.emit(SessionEvent::MessagesReset);
    }

    /// Delete a conversation with all of its messages
    pub async fn delete_conversation(&mut self, id: &ConversationId) -> RepositoryResult<()> {
        self.store.remove(id).await?;

        let was_active = self.conversations.active_id() == Some(id);
        self.conversations.delete_conversation(id);
        self.emit(SessionEvent::ConversationsChanged);

        if was_active {
            self.cancel.cancel();
            self.messages.clear();
            self.emit(SessionEvent::ActiveConversationChanged(None));
            self.emit(SessionEvent::MessagesReset);
        }
        info!(conversation_id = %id, was_active, "Conversation deleted");
        Ok(())
    }

    /// Id sent in the stream URL. Anonymous users always start from 0; their
    /// exchanges are grouped locally by model instead.
    fn outgoing_conversation_id(&self) -> i64 {
        if !self.store.is_signed_in() {
            return 0;
        }
        self.conversations.active_id().map_or(0, ConversationId::wire_id)
    }

    async fn resolve_token(&self) -> ApiResult<Option<String>> {
        match self.store.identity() {
            Some(identity) => identity
                .get_token()
                .await
                .map(Some)
                .map_err(|e| ApiError::Token(e.to_string())),
            None => Ok(None),
        }
    }

    async fn run_exchange(
        &mut self,
        request: ChatRequest,
        placeholder_id: &MessageId,
        user_text: &str,
        cancel: CancellationToken,
    ) -> ApiResult<()> {
        let conversation_id = request.conversation_id;

        let resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            token = self.resolve_token() => Some(token),
        };
        let token = resolved.ok_or(ApiError::Cancelled)??;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.transport.open_stream(request, token) => Some(opened),
        };
        let body = opened.ok_or(ApiError::Cancelled)??;

        self.transition(ExchangeState::Streaming);
        let mut chunks = decode_chat_stream(body, conversation_id, cancel.clone());
        let sink = self.events.clone();

        loop {
            if self.events_gone {
                debug!("Session consumer gone, stopping stream");
                cancel.cancel();
            }

            let next = tokio::select! {
                biased;
                chunk = chunks.next() => Some(chunk),
                _ = consumer_gone(sink.as_ref()) => None,
            };
            let Some(chunk) = next else {
                debug!("Session consumer gone while waiting for the body, stopping stream");
                self.events = None;
                self.events_gone = true;
                cancel.cancel();
                return Err(ApiError::Cancelled);
            };
            let Some(chunk) = chunk else {
                break;
            };

            match chunk? {
                StreamChunk::ConversationCreated(id) => {
                    let conversation = Conversation::created_remotely(id, derive_title(user_text), &self.chat_model);
                    info!(conversation_id = id, "Server created conversation");
                    self.conversations.add_conversation(conversation.clone());
                    self.emit(SessionEvent::ConversationCreated(conversation));
                    self.emit(SessionEvent::ActiveConversationChanged(Some(ConversationId::Remote(id))));
                }
                StreamChunk::Text(text) => {
                    self.update_message(placeholder_id, |m| m.content = text);
                }
                StreamChunk::Done => break,
            }
        }
        Ok(())
    }

    /// Remote users get a list refresh; anonymous users get the exchange
    /// written to the model's local thread, which becomes active
    async fn persist_exchange(&mut self, user: Message, assistant: Message) {
        if self.store.is_signed_in() {
            if let Err(e) = self.load_conversations().await {
                warn!(error = ?e, "Failed to refresh conversations");
            }
            return;
        }

        match self
            .store
            .append_anonymous_exchange(user, assistant, &self.chat_model)
            .await
        {
            Ok(local) => {
                let active = local.first().cloned();
                self.conversations
                    .replace_all(local.iter().map(Conversation::summary).collect());
                if let Some(thread) = active {
                    let id = thread.id.clone();
                    self.conversations.set_active(thread);
                    self.emit(SessionEvent::ActiveConversationChanged(Some(id)));
                }
                self.emit(SessionEvent::ConversationsChanged);
            }
            Err(e) => warn!(error = ?e, "Failed to save anonymous exchange"),
        }
    }

    async fn request_image(&self, prompt: &str) -> ApiResult<GeneratedImage> {
        let identity = self.store.identity().ok_or(ApiError::AuthRequired)?;
        let token = identity
            .get_token()
            .await
            .map_err(|e| ApiError::Token(e.to_string()))?;

        let active_id = self
            .conversations
            .active_id()
            .map(ConversationId::wire_id);
        let request = build_image_request(prompt, &self.image_model, active_id);
        self.client.generate_image(&request, &token).await
    }

    /// Make the conversation the server filed the image under active
    async fn link_image_conversation(&mut self, conversation_id: i64, prompt: &str) {
        let linked = ConversationId::Remote(conversation_id);
        if self.conversations.active_id() == Some(&linked) {
            return;
        }

        if let Err(e) = self.load_conversations().await {
            warn!(error = ?e, "Failed to refresh conversations after image generation");
        }

        let conversation = self
            .conversations
            .get_conversation(&linked)
            .cloned()
            .unwrap_or_else(|| {
                Conversation::created_remotely(conversation_id, derive_title(prompt), &self.image_model)
            });
        self.conversations.set_active(conversation);
        self.emit(SessionEvent::ActiveConversationChanged(Some(linked)));
    }

    fn transition(&mut self, next: ExchangeState) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "Unexpected exchange state transition");
        }
        self.state = next;
        self.emit(SessionEvent::StateChanged(next));
    }

    fn append_message(&mut self, message: Message) {
        self.messages.push(message.clone());
        self.emit(SessionEvent::MessageAppended(message));
    }

    /// Mutate a message in place, matched by id
    fn update_message(&mut self, id: &MessageId, update: impl FnOnce(&mut Message)) {
        let Some(message) = self.messages.iter_mut().find(|m| &m.id == id) else {
            debug!(message_id = %id, "Message no longer visible, update dropped");
            return;
        };
        update(message);
        let event = SessionEvent::MessageUpdated {
            id: id.clone(),
            content: message.content.clone(),
        };
        self.emit(event);
    }

    fn emit(&mut self, event: SessionEvent) {
        let closed = match &self.events {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if closed {
            self.events = None;
            self.events_gone = true;
        }
    }
}

/// Resolves once every receiver of `events` is gone; never without a subscriber
async fn consumer_gone(events: Option<&mpsc::UnboundedSender<SessionEvent>>) {
    match events {
        Some(tx) => tx.closed().await,
        None => std::future::pending().await,
    }
}
