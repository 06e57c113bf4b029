/// Longest title kept verbatim
const MAX_TITLE_CHARS: usize = 50;
/// Characters kept before the ellipsis when a title is shortened
const TRUNCATED_TITLE_CHARS: usize = 47;

const FALLBACK_TITLE: &str = "New Chat";

/// Title for a conversation, derived from its first user message.
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn derive_title(first_message: &str) -> String {
    let cleaned = first_message.trim();

    if cleaned.is_empty() {
        FALLBACK_TITLE.to_string()
    } else if cleaned.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = cleaned.chars().take(TRUNCATED_TITLE_CHARS).collect();
        format!("{}...", truncated)
    } else {
        cleaned.to_string()
    }
}
