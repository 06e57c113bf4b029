pub mod anonymous_repository;
pub mod conversation_repository;
pub mod conversation_store;
pub mod error;
pub mod in_memory_store;
pub mod json_file_store;
pub mod key_value_store;
pub mod remote_repository;

pub use anonymous_repository::{ANONYMOUS_CONVERSATIONS_KEY, AnonymousConversationRepository};
pub use conversation_repository::{BoxFuture, ConversationRepository};
pub use conversation_store::ConversationStore;
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_store::InMemoryStore;
pub use json_file_store::JsonFileStore;
pub use key_value_store::KeyValueStore;
pub use remote_repository::RemoteConversationRepository;
