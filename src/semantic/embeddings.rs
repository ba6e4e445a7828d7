//! Hash-based fallback embedding.
//!
//! Bag-of-words hashing into a fixed number of slots:
//! - lower-case the text and split it into word tokens
//! - sum each token's character codes, reduce modulo the dimension
//! - count hits per slot, then L2-normalize
//!
//! Collisions are expected. This only exists so capture and search keep
//! working when no model-backed embedding service is reachable.

use once_cell::sync::Lazy;
use regex::Regex;

/// Dimension of locally generated vectors.
pub const LOCAL_DIMENSIONS: usize = 384;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word regex is valid"));

/// Deterministic, stateless embedder.
#[derive(Debug, Clone, Copy)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new(LOCAL_DIMENSIONS)
    }
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed one text. Text without word tokens yields the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for token in WORD_RE.find_iter(&lowered) {
            let code_sum: u64 = token.as_str().chars().map(|c| c as u64).sum();
            embedding[(code_sum % self.dimensions as u64) as usize] += 1.0;
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }

        embedding
    }

    /// Embed several texts, preserving order.
    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedding = LocalEmbedder::default().embed("");
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|v| *v == 0.0));

        let embedding = LocalEmbedder::default().embed("  ... !!! --- ");
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let embedding = LocalEmbedder::default().embed("The quick brown fox jumps over the lazy dog");
        assert!((norm(&embedding) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embedding_is_pure() {
        let embedder = LocalEmbedder::default();
        let text = "Elephant migration patterns across the savanna";
        assert_eq!(embedder.embed(text), embedder.embed(text));
    }

    #[test]
    fn test_case_folding() {
        let embedder = LocalEmbedder::default();
        assert_eq!(embedder.embed("Rust Programming"), embedder.embed("rust programming"));
    }

    #[test]
    fn test_slot_is_char_code_sum_mod_dimension() {
        // "ab" = 97 + 98 = 195
        let embedding = LocalEmbedder::default().embed("ab");
        assert_eq!(embedding[195], 1.0);
        assert_eq!(embedding.iter().filter(|v| **v != 0.0).count(), 1);

        // "zzzz" = 4 * 122 = 488 -> 488 % 384 = 104
        let embedding = LocalEmbedder::default().embed("ZZZZ");
        assert_eq!(embedding[104], 1.0);
    }

    #[test]
    fn test_repeated_tokens_accumulate() {
        let embedding = LocalEmbedder::new(8).embed("a a b");
        // 'a' = 97 % 8 = 1, 'b' = 98 % 8 = 2; counts 2 and 1
        let expected_norm = (5.0f32).sqrt();
        assert!((embedding[1] - 2.0 / expected_norm).abs() < 1e-6);
        assert!((embedding[2] - 1.0 / expected_norm).abs() < 1e-6);
    }

    #[test]
    fn test_batch_preserves_order() {
        let embedder = LocalEmbedder::default();
        let texts = vec!["first".to_string(), "second".to_string()];
        let batch = embedder.embed_batch(&texts);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("first"));
        assert_eq!(batch[1], embedder.embed("second"));
    }
}
