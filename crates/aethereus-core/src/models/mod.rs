pub mod conversation;
pub mod conversations_store;
pub mod image;
pub mod message;
pub mod timestamp;

pub use conversation::{ANONYMOUS_ID_PREFIX, Conversation, ConversationDetail, ConversationId};
pub use conversations_store::ConversationsModel;
pub use image::GeneratedImage;
pub use message::{Message, MessageId, MessageKind, Role};
