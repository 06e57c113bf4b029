//! Markdown-subset formatter for assistant messages
//!
//! Supports:
//! - Images: `![alt](url)` (tagged for click-to-enlarge)
//! - Fenced code blocks with optional language tag, inline code spans
//! - Links `[text](url)`, bold `**text**`, ATX headers
//! - Numbered lists, bullets (`*`, `-`, `•`) and indented sub-bullets
//!
//! Only code content is HTML-escaped; everything else is expected to be the
//! markdown subset above. The formatter is total and is re-run on every
//! streamed prefix, so unterminated syntax simply stays literal.

mod rendered_cache;

pub use rendered_cache::{ContentCacheKey, RenderedContentCache};

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Code blocks are swapped for these tokens while paragraphs are processed.
/// Private-use delimiters keep them from colliding with real text.
const PLACEHOLDER_MARK: char = '\u{E000}';

/// Deepest sub-bullet nesting class emitted
const MAX_SUB_BULLET_LEVEL: usize = 2;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("formatter patterns are valid")
}

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"!\[(.*?)\]\((.*?)\)"));
static FENCE_WITH_LANG_RE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"```(\w+)?\r?\n((?s:.*?))```"));
static FENCE_BARE_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"```((?s:.*?))```"));
static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"`([^`]+)`"));
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"\[([^\]\n]+)\]\(([^)\s]+)\)"));
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"\*\*(.*?)\*\*"));
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"(?m)^#{1,6}[ \t]+(.+?)[ \t]*$"));
static PARAGRAPH_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"\n\s*\n"));
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| regex("\u{E000}CODE_BLOCK_(\\d+)\u{E000}"));
static NUMBERED_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"^\d+\.\s+[^:\n]+:\s*$"));
static COLON_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"^[A-Z][^.!?\n]*:\s*$"));
static NUMBERED_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"^\d+\.\s+"));
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"^[*\-•]\s+"));

/// Escape the five HTML-significant characters
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn placeholder(index: usize) -> String {
    format!("{0}CODE_BLOCK_{1}{0}", PLACEHOLDER_MARK, index)
}

fn code_block_html(language: Option<&str>, code: &str) -> String {
    match language {
        Some(lang) => format!(
            "<div class=\"code-block\"><pre><code class=\"language-{}\">{}</code></pre></div>",
            lang,
            escape_html(code)
        ),
        None => format!(
            "<div class=\"code-block\"><pre><code>{}</code></pre></div>",
            escape_html(code)
        ),
    }
}

/// Replace fenced code blocks with placeholders, collecting their markup
fn extract_code_blocks(text: &str, blocks: &mut Vec<String>) -> String {
    let with_lang = FENCE_WITH_LANG_RE.replace_all(text, |caps: &Captures| {
        let language = caps.get(1).map(|m| m.as_str());
        blocks.push(code_block_html(language, &caps[2]));
        placeholder(blocks.len() - 1)
    });

    // Fences without a newline after the opening backticks
    FENCE_BARE_RE
        .replace_all(&with_lang, |caps: &Captures| {
            blocks.push(code_block_html(None, &caps[1]));
            placeholder(blocks.len() - 1)
        })
        .into_owned()
}

/// Number of leading whitespace columns, tabs counting as four
fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn sub_bullet_level(indent: usize) -> usize {
    (1 + indent / 4).min(MAX_SUB_BULLET_LEVEL)
}

/// Render one line of a paragraph; returns the markup and whether it was a list item
fn format_line(line: &str) -> (String, bool) {
    let trimmed = line.trim();

    if NUMBERED_ITEM_RE.is_match(trimmed) {
        return (
            format!("<div class=\"list-item numbered\">{}</div>", trimmed),
            true,
        );
    }

    if let Some(marker) = BULLET_RE.find(trimmed) {
        let text = &trimmed[marker.end()..];
        let indent = indent_width(line);
        let html = if indent > 0 {
            format!(
                "<div class=\"list-item sub-bullet level-{}\">{}</div>",
                sub_bullet_level(indent),
                text
            )
        } else {
            format!("<div class=\"list-item bullet\">{}</div>", text)
        };
        return (html, true);
    }

    (trimmed.to_string(), false)
}

fn format_paragraph(paragraph: &str) -> String {
    // Leading indentation of the first line matters for sub-bullets,
    // so only blank lines around the paragraph are dropped here.
    let paragraph = paragraph.trim_matches(|c| c == '\n' || c == '\r');
    let trimmed = paragraph.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if PLACEHOLDER_RE
        .find(trimmed)
        .is_some_and(|m| m.start() == 0 && m.end() == trimmed.len())
    {
        return trimmed.to_string();
    }

    if NUMBERED_HEADER_RE.is_match(trimmed) {
        return format!("<div class=\"numbered-header\">{}</div>", trimmed);
    }

    if trimmed.starts_with("<div class=\"heading\">") {
        return trimmed.to_string();
    }

    if COLON_HEADING_RE.is_match(trimmed) {
        return format!("<div class=\"heading\">{}</div>", trimmed);
    }

    let mut has_list_items = false;
    let lines: Vec<String> = paragraph
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (html, is_item) = format_line(line);
            has_list_items |= is_item;
            html
        })
        .collect();

    if has_list_items {
        lines.concat()
    } else {
        format!("<div class=\"paragraph\">{}</div>", lines.join("<br/>"))
    }
}

/// Convert raw assistant text into display markup.
///
/// Safe to call on any prefix of a streamed message.
pub fn format_message_content(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    // 1. Images
    let formatted = IMAGE_RE.replace_all(
        content,
        "<img class=\"chat-image\" data-action=\"enlarge\" src=\"$2\" alt=\"$1\" />",
    );

    // 2. Fenced code blocks become placeholders
    let mut code_blocks = Vec::new();
    let formatted = extract_code_blocks(&formatted, &mut code_blocks);

    // 3. Inline code
    let formatted = INLINE_CODE_RE.replace_all(&formatted, |caps: &Captures| {
        format!("<code class=\"inline-code\">{}</code>", escape_html(&caps[1]))
    });

    // 4. Links open in a new context without opener/referrer
    let formatted = LINK_RE.replace_all(
        &formatted,
        "<a href=\"$2\" target=\"_blank\" rel=\"noopener noreferrer\">$1</a>",
    );

    // 5. Bold
    let formatted = BOLD_RE.replace_all(&formatted, "<strong>$1</strong>");

    // 6. Headers
    let formatted = HEADER_RE.replace_all(&formatted, "<div class=\"heading\">$1</div>");

    // 7-8. Paragraphs and lists
    let result: String = PARAGRAPH_SPLIT_RE
        .split(&formatted)
        .map(format_paragraph)
        .filter(|p| !p.is_empty())
        .collect();

    // 9. Restore code blocks in a single pass so restored code is never rescanned
    PLACEHOLDER_RE
        .replace_all(&result, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|index| code_blocks.get(index))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned()
}
