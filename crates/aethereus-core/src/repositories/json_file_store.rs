use std::path::PathBuf;

use super::conversation_repository::BoxFuture;
use super::error::RepositoryResult;
use super::key_value_store::KeyValueStore;

/// File-backed key-value store.
/// Stores each key as a separate `<key>.json` file in one directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        let path = self.slot_path(key);

        Box::pin(async move {
            if !tokio::fs::try_exists(&path).await? {
                return Ok(None);
            }
            Ok(Some(tokio::fs::read_to_string(&path).await?))
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.slot_path(key);
        let dir = self.dir.clone();

        Box::pin(async move {
            // Ensure directory exists
            tokio::fs::create_dir_all(&dir).await?;

            // Write to file atomically (write to temp, then rename)
            let temp_path = path.with_extension("json.tmp");
            tokio::fs::write(&temp_path, value).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.slot_path(key);

        Box::pin(async move {
            if tokio::fs::try_exists(&path).await? {
                tokio::fs::remove_file(&path).await?;
            }
            Ok(())
        })
    }
}
