//! Wire shapes of the backend's JSON bodies.
//!
//! These are converted into the domain models once, at the edge, so the
//! rest of the crate never sniffs `type`/`messageType` fields again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timestamp;
use crate::models::{Conversation, ConversationDetail, Message, MessageId, MessageKind, Role};

/// Body of `POST /api/conversations/{id}/messages/stream`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Target conversation; 0 asks the server to create one
    #[serde(skip)]
    pub conversation_id: i64,
    pub content: String,
    pub ai_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Body of `POST /api/images/generate`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    pub image_url: String,
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}

/// A message as the server returns it
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(default)]
    pub id: Option<MessageId>,
    /// USER or ASSISTANT
    #[serde(rename = "type", default)]
    pub role: Option<String>,
    /// TEXT or IMAGE for assistant replies; some payloads repeat the role here
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, alias = "timestamp", deserialize_with = "timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<MessageDto> for Message {
    fn from(dto: MessageDto) -> Self {
        let role_hint = dto.role.as_deref().or(dto.message_type.as_deref());
        let role = match role_hint {
            Some(r) if r.eq_ignore_ascii_case("USER") => Role::User,
            _ => Role::Assistant,
        };
        let kind = match dto.message_type.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("IMAGE") => MessageKind::Image,
            _ => MessageKind::Text,
        };
        // Image replies already embed their URL in the markdown content
        let attachment_url = match role {
            Role::User => dto.image_url,
            Role::Assistant => None,
        };

        Message {
            id: dto.id.unwrap_or_else(MessageId::generate),
            role,
            content: dto.content,
            attachment_url,
            kind,
            created_at: dto.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// `GET /api/conversations/{id}` response
#[derive(Debug, Deserialize)]
pub struct ConversationDetailDto {
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: Vec<MessageDto>,
}

impl From<ConversationDetailDto> for ConversationDetail {
    fn from(dto: ConversationDetailDto) -> Self {
        Self {
            conversation: dto.conversation,
            messages: dto.messages.into_iter().map(Message::from).collect(),
        }
    }
}
