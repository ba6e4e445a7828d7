//! Sentence-aligned chunking of captured page text.
//!
//! Sentences are accumulated greedily into chunks of at most `target_size`
//! characters. A sentence is never split: one longer than `target_size`
//! becomes a chunk of its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]+").expect("sentence regex is valid"));

/// Split text into trimmed, non-empty sentences.
///
/// Text after the last terminator is kept as a final sentence. Text without
/// any terminator is a single sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut last_end = 0;

    for m in SENTENCE_RE.find_iter(text) {
        sentences.push(m.as_str());
        last_end = m.end();
    }

    if sentences.is_empty() {
        sentences.push(text);
    } else if last_end < text.len() {
        sentences.push(&text[last_end..]);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Chunk `text` into sentence-aligned segments of roughly `target_size` characters.
pub fn chunk(text: &str, target_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        let joined_len = if current.is_empty() {
            sentence_len
        } else {
            current_len + 1 + sentence_len
        };

        if joined_len > target_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_len = joined_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(chunk("", 500).is_empty());
        assert!(chunk("   \n\t ", 500).is_empty());
    }

    #[test]
    fn test_no_terminator_is_single_sentence() {
        assert_eq!(chunk("  just some words  ", 500), vec!["just some words"]);
    }

    #[test]
    fn test_short_sentences_share_a_chunk() {
        let chunks = chunk("First one. Second one! Third one?", 500);
        assert_eq!(chunks, vec!["First one. Second one! Third one?"]);
    }

    #[test]
    fn test_flush_when_target_exceeded() {
        // each sentence is 10 chars; two of them joined are 21
        let chunks = chunk("aaaaaaaaa. bbbbbbbbb. ccccccccc.", 20);
        assert_eq!(chunks, vec!["aaaaaaaaa.", "bbbbbbbbb.", "ccccccccc."]);

        let chunks = chunk("aaaaaaaaa. bbbbbbbbb. ccccccccc.", 21);
        assert_eq!(chunks, vec!["aaaaaaaaa. bbbbbbbbb.", "ccccccccc."]);
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = format!("{}.", "C".repeat(600));
        let text = format!("A. B. {long}");

        let chunks = chunk(&text, 500);
        assert_eq!(chunks, vec!["A. B.".to_string(), long.clone()]);
        assert_eq!(chunks[1].chars().count(), 601);

        // oversized sentence first, followed by short ones
        let chunks = chunk(&format!("{long} A. B."), 500);
        assert_eq!(chunks, vec![long, "A. B.".to_string()]);
    }

    #[test]
    fn test_trailing_text_is_kept() {
        let chunks = chunk("Hello there. and a tail without stop", 500);
        assert_eq!(chunks, vec!["Hello there. and a tail without stop"]);
    }

    #[test]
    fn test_chunks_preserve_sentences_in_order() {
        let text = "One fish. Two fish! Red fish? Blue fish. ".repeat(40);
        let chunks = chunk(&text, 60);

        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert!(chunks.iter().all(|c| c.chars().count() <= 60));

        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| split_sentences(c)).collect();
        assert_eq!(rejoined, split_sentences(&text));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta. Gamma delta! Epsilon? ".repeat(30);
        assert_eq!(chunk(&text, 100), chunk(&text, 100));
    }

    #[test]
    fn test_multibyte_counts_characters() {
        // 10 chars (19 bytes) per sentence, 21 chars joined
        let text = format!("{}. {}.", "é".repeat(9), "à".repeat(9));
        assert_eq!(chunk(&text, 21), vec![text.clone()]);
        assert_eq!(chunk(&text, 20).len(), 2);
    }
}
