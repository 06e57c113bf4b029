use crate::models::{Conversation, ConversationId, Message, MessageId};

use super::exchange_state::ExchangeState;

/// Notifications for whoever renders the session.
/// Consumers re-render the named message from its full content.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StateChanged(ExchangeState),
    MessageAppended(Message),
    /// Full content of a message that changed in place
    MessageUpdated { id: MessageId, content: String },
    /// The server created a conversation for the running exchange
    ConversationCreated(Conversation),
    ConversationsChanged,
    ActiveConversationChanged(Option<ConversationId>),
    /// The message list was replaced or cleared
    MessagesReset,
    GalleryChanged,
}
