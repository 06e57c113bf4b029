use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use super::format_message_content;
use crate::models::MessageId;

/// A content hash used to detect changed messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentCacheKey(u64);

impl ContentCacheKey {
    pub fn new(content: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self(hasher.finish())
    }
}

struct CachedRender {
    key: ContentCacheKey,
    html: String,
}

/// Cache of formatted markup, one entry per message.
///
/// While a reply streams in, only the growing message is reformatted and its
/// entry is overwritten; every other message in the thread is served from here.
#[derive(Default)]
pub struct RenderedContentCache {
    entries: HashMap<MessageId, CachedRender>,
}

impl RenderedContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formatted markup for message `id`, recomputed when its content changed
    pub fn render(&mut self, id: &MessageId, content: &str) -> &str {
        let key = ContentCacheKey::new(content);
        let entry = self.entries.entry(id.clone()).or_insert_with(|| CachedRender {
            key,
            html: format_message_content(content),
        });
        if entry.key != key {
            entry.key = key;
            entry.html = format_message_content(content);
        }
        &entry.html
    }

    pub fn get(&self, id: &MessageId) -> Option<&str> {
        self.entries.get(id).map(|entry| entry.html.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the entire cache (e.g., on conversation switch)
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
