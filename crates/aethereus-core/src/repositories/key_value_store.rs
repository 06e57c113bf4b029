use super::conversation_repository::BoxFuture;
use super::error::RepositoryResult;

/// Durable string slots addressed by a fixed key
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>>;

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>>;

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>>;
}
