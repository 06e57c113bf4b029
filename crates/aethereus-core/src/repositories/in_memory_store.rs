use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::conversation_repository::BoxFuture;
use super::error::RepositoryResult;
use super::key_value_store::KeyValueStore;

/// In-memory key-value store
/// Useful for testing and for sessions that should leave nothing on disk
#[derive(Clone, Default)]
pub struct InMemoryStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let value = self.slots.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>> {
        self.slots.lock().insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        self.slots.lock().remove(key);
        Box::pin(async { Ok(()) })
    }
}
