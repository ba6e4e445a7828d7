//! Page text extraction for capture.
//!
//! Turns an HTML snapshot into the plain text that gets chunked:
//! 1. Drop non-content subtrees (scripts, styles, navigation, footers, frames)
//! 2. Join the remaining text nodes
//! 3. Collapse whitespace runs to single spaces and trim
//! 4. Truncate to a maximum number of characters

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};

/// Maximum captured content length (characters)
pub const MAX_CONTENT_LENGTH: usize = 50_000;

/// Elements whose text never counts as page content
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "iframe", "noscript"];

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("body selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector"));

/// Text and title pulled out of an HTML document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
}

/// Collapse whitespace and cap the length at `max_chars` characters.
pub fn normalize_text(text: &str, max_chars: usize) -> String {
    let collapsed = WHITESPACE_RE.replace_all(text, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    trimmed.chars().take(max_chars).collect()
}

/// Extract title and body text from an HTML document.
pub fn extract_page(html: &str, max_chars: usize) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|el| normalize_text(&el.text().collect::<String>(), usize::MAX))
        .unwrap_or_default();

    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut pieces: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| SKIPPED_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });

        if !skipped {
            pieces.push(&**text);
        }
    }

    ExtractedPage {
        title,
        content: normalize_text(&pieces.join(" "), max_chars),
    }
}
