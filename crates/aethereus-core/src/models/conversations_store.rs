use super::conversation::{Conversation, ConversationId};

/// In-memory conversation list shown to the user, plus the active thread.
///
/// The list keeps the order the backend (or local storage) returned;
/// newly created conversations go to the head.
#[derive(Debug, Default)]
pub struct ConversationsModel {
    conversations: Vec<Conversation>,
    active: Option<Conversation>,
}

impl ConversationsModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list (after a refresh)
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Insert at the head of the list and make it the active conversation
    pub fn add_conversation(&mut self, conversation: Conversation) {
        self.conversations.retain(|c| c.id != conversation.id);
        self.conversations.insert(0, conversation.summary());
        self.active = Some(conversation);
    }

    pub fn get_conversation(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    /// Remove a conversation; clears the active reference if it was active
    pub fn delete_conversation(&mut self, id: &ConversationId) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|c| &c.id != id);

        if self.active_id() == Some(id) {
            self.active = None;
        }

        self.conversations.len() != before
    }

    pub fn set_active(&mut self, conversation: Conversation) {
        self.active = Some(conversation);
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref().map(|c| &c.id)
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn list_all(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn count(&self) -> usize {
        self.conversations.len()
    }
}
