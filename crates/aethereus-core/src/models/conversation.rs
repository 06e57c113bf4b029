use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::timestamp;

/// Prefix reserved for ids synthesized on this device
pub const ANONYMOUS_ID_PREFIX: &str = "anon_";

/// Conversation identifier.
///
/// Server ids are numbers; anonymous conversations use strings in the
/// `anon_` namespace, so the two spaces can never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationId {
    Remote(i64),
    Local(String),
}

impl ConversationId {
    pub fn new_local() -> Self {
        Self::Local(format!(
            "{}{}",
            ANONYMOUS_ID_PREFIX,
            uuid::Uuid::new_v4().simple()
        ))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Id sent in the stream URL: the server id, or 0 for "create a new thread"
    pub fn wire_id(&self) -> i64 {
        match self {
            Self::Remote(id) => *id,
            Self::Local(_) => 0,
        }
    }

    /// Parse an id typed by a user or read from a URL
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with(ANONYMOUS_ID_PREFIX) {
            return Some(Self::Local(raw.to_string()));
        }
        raw.parse::<i64>().ok().filter(|id| *id > 0).map(Self::Remote)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{}", id),
            Self::Local(id) => f.write_str(id),
        }
    }
}

/// A conversation thread. `messages` is only populated for anonymous
/// threads and for conversations loaded in full.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ai_model: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Record for a thread the server just created for this session
    pub fn created_remotely(id: i64, title: String, ai_model: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::Remote(id),
            title,
            ai_model: ai_model.to_string(),
            is_anonymous: false,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Fresh anonymous thread bound to one model
    pub fn new_anonymous(title: String, ai_model: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new_local(),
            title,
            ai_model: ai_model.to_string(),
            is_anonymous: true,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Append to the thread and bump `updated_at`. The title never changes.
    pub fn push_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.updated_at = Utc::now();
    }

    /// Copy without the message history, as shown in the sidebar
    pub fn summary(&self) -> Self {
        Self {
            messages: Vec::new(),
            ..self.clone()
        }
    }
}

/// Conversation loaded in full: `GET /api/conversations/{id}`
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}
