//! Cosine similarity ranking and grouping of chunk matches by document.
//!
//! Ranking is a full scan: every stored chunk is scored against the query,
//! matches at or below the threshold are dropped, and the rest are stably
//! sorted by score. Grouping then folds the top matches under their owning
//! document in first-seen order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::pages::{Category, CategoryFilter, ChunkRecord, EmbeddingMethod};

/// One chunk scored against a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub url: String,
    pub text: String,
    pub chunk_index: usize,
    /// Cosine similarity (0.0 to 1.0 for the non-negative vectors used here)
    pub similarity: f32,
}

/// A matched chunk inside a [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedChunk {
    pub text: String,
    pub chunk_index: usize,
    pub similarity: f32,
}

/// Chunk matches grouped under their document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub category: Option<Category>,
    pub favicon: Option<String>,
    pub matches: Vec<MatchedChunk>,
}

/// Document fields copied into each group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub category: Option<Category>,
    pub favicon: Option<String>,
}

/// Caps applied while grouping.
#[derive(Debug, Clone, Copy)]
pub struct GroupLimits {
    /// Matches considered, taken from the top of the ranking
    pub max_matches: usize,
    /// Groups returned
    pub max_groups: usize,
}

impl Default for GroupLimits {
    fn default() -> Self {
        Self {
            max_matches: 50,
            max_groups: 10,
        }
    }
}

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity. Zero norm on either side, differing lengths, or a
/// non-finite result (overflowing vectors) score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Score every record produced by `method` against `query`.
///
/// Records from another embedding method or with another dimension are
/// skipped. With a threshold, only scores strictly above it are kept.
/// Results are sorted by score descending; equal scores keep corpus order.
pub fn rank<'a, I>(
    query: &[f32],
    method: EmbeddingMethod,
    corpus: I,
    threshold: Option<f32>,
) -> Vec<ChunkMatch>
where
    I: IntoIterator<Item = &'a ChunkRecord>,
{
    let mut skipped = 0usize;

    let mut results: Vec<ChunkMatch> = corpus
        .into_iter()
        .filter(|record| {
            let comparable = record.method == method && record.embedding.len() == query.len();
            if !comparable {
                skipped += 1;
            }
            comparable
        })
        .filter_map(|record| {
            let similarity = cosine_similarity(query, &record.embedding);
            match threshold {
                Some(threshold) if similarity <= threshold => None,
                _ => Some(ChunkMatch {
                    url: record.url.clone(),
                    text: record.text.clone(),
                    chunk_index: record.chunk_index,
                    similarity,
                }),
            }
        })
        .collect();

    if skipped > 0 {
        log::debug!("skipped {skipped} chunks with incompatible vectors");
    }

    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

    results
}

/// Group ranked matches by document URL.
///
/// Only the first `max_matches` matches are considered. `lookup` is called
/// once per URL, on its first occurrence; documents rejected by `filter` are
/// dropped entirely. Groups keep first-seen order and are capped at
/// `max_groups`.
pub fn group_matches<F>(
    matches: Vec<ChunkMatch>,
    filter: CategoryFilter,
    limits: GroupLimits,
    mut lookup: F,
) -> Vec<SearchResult>
where
    F: FnMut(&ChunkMatch) -> Option<DocumentInfo>,
{
    let mut groups: Vec<SearchResult> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rejected: HashSet<String> = HashSet::new();

    for chunk_match in matches.into_iter().take(limits.max_matches) {
        if rejected.contains(&chunk_match.url) {
            continue;
        }

        let position = match positions.get(&chunk_match.url) {
            Some(position) => *position,
            None => {
                let info = lookup(&chunk_match).unwrap_or_default();
                if !filter.admits(info.category) {
                    rejected.insert(chunk_match.url.clone());
                    continue;
                }

                groups.push(SearchResult {
                    url: chunk_match.url.clone(),
                    title: info.title,
                    category: info.category,
                    favicon: info.favicon,
                    matches: Vec::new(),
                });
                positions.insert(chunk_match.url.clone(), groups.len() - 1);
                groups.len() - 1
            }
        };

        groups[position].matches.push(MatchedChunk {
            text: chunk_match.text,
            chunk_index: chunk_match.chunk_index,
            similarity: chunk_match.similarity,
        });
    }

    groups.truncate(limits.max_groups);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, index: usize, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            text: format!("{url} #{index}"),
            embedding,
            url: url.to_string(),
            chunk_index: index,
            method: EmbeddingMethod::Local,
        }
    }

    fn chunk_match(url: &str, index: usize, similarity: f32) -> ChunkMatch {
        ChunkMatch {
            url: url.to_string(),
            text: format!("{url} #{index}"),
            chunk_index: index,
            similarity,
        }
    }

    #[test]
    fn test_cosine_reflexive_and_symmetric() {
        let a = vec![1.0, 2.0, 0.5];
        let b = vec![0.3, 0.0, 4.0];

        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        let zero = vec![0.0, 0.0, 0.0];
        let a = vec![1.0, 0.0, 0.0];

        assert_eq!(cosine_similarity(&zero, &a), 0.0);
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_overflowing_vector_scores_zero() {
        let corrupt = vec![f32::MAX, f32::MAX];
        assert_eq!(cosine_similarity(&corrupt, &[1.0, 1.0]), 0.0);

        let corpus = vec![
            record("https://corrupt.example", 0, corrupt),
            record("https://a.example", 0, vec![1.0, 1.0]),
        ];
        let results = rank(&[1.0, 1.0], EmbeddingMethod::Local, &corpus, None);
        assert_eq!(results[0].url, "https://a.example");
        assert_eq!(results[1].similarity, 0.0);

        assert_eq!(rank(&[1.0, 1.0], EmbeddingMethod::Local, &corpus, Some(0.3)).len(), 1);
    }

    #[test]
    fn test_rank_exact_match_first_with_score_one() {
        let corpus = vec![
            record("https://b.example", 0, vec![0.0, 1.0, 0.0]),
            record("https://a.example", 0, vec![0.6, 0.8, 0.0]),
            record("https://c.example", 0, vec![1.0, 0.0, 0.0]),
        ];

        let results = rank(&[1.0, 0.0, 0.0], EmbeddingMethod::Local, &corpus, Some(0.3));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://c.example");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[1].url, "https://a.example");
    }

    #[test]
    fn test_rank_threshold_is_strict() {
        let query = vec![1.0, 0.0];
        let corpus = vec![record("https://a.example", 0, vec![1.0, 1.0])];
        let score = cosine_similarity(&query, &corpus[0].embedding);

        assert_eq!(rank(&query, EmbeddingMethod::Local, &corpus, Some(0.7)).len(), 1);
        assert!(rank(&query, EmbeddingMethod::Local, &corpus, Some(0.71)).is_empty());
        // a score equal to the threshold does not pass
        assert!(rank(&query, EmbeddingMethod::Local, &corpus, Some(score)).is_empty());
    }

    #[test]
    fn test_rank_without_threshold_keeps_everything() {
        let corpus = vec![
            record("https://a.example", 0, vec![0.0, 1.0]),
            record("https://b.example", 0, vec![1.0, 0.0]),
        ];
        let results = rank(&[1.0, 0.0], EmbeddingMethod::Local, &corpus, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].similarity, 0.0);
    }

    #[test]
    fn test_rank_ties_keep_corpus_order() {
        let corpus: Vec<ChunkRecord> = (0..5)
            .map(|i| record("https://a.example", i, vec![1.0, 1.0]))
            .collect();

        let results = rank(&[1.0, 1.0], EmbeddingMethod::Local, &corpus, Some(0.3));
        let order: Vec<usize> = results.iter().map(|m| m.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_rank_skips_other_methods_and_dimensions() {
        let mut remote = record("https://remote.example", 0, vec![1.0, 0.0]);
        remote.method = EmbeddingMethod::Remote;
        let corpus = vec![
            remote,
            record("https://wide.example", 0, vec![1.0, 0.0, 0.0]),
            record("https://ok.example", 0, vec![1.0, 0.0]),
        ];

        let results = rank(&[1.0, 0.0], EmbeddingMethod::Local, &corpus, None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://ok.example");
    }

    #[test]
    fn test_group_preserves_first_seen_order() {
        let matches = vec![
            chunk_match("https://a.example", 2, 0.9),
            chunk_match("https://b.example", 0, 0.8),
            chunk_match("https://a.example", 0, 0.7),
        ];

        let groups = group_matches(matches, CategoryFilter::All, GroupLimits::default(), |_| {
            None
        });

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].url, "https://a.example");
        assert_eq!(groups[0].matches.len(), 2);
        assert_eq!(groups[0].matches[0].chunk_index, 2);
        assert_eq!(groups[0].matches[1].chunk_index, 0);
        assert_eq!(groups[1].url, "https://b.example");
    }

    #[test]
    fn test_group_cap_of_ten() {
        let matches: Vec<ChunkMatch> = (0..25)
            .map(|i| chunk_match(&format!("https://{i}.example"), 0, 1.0 - i as f32 * 0.01))
            .collect();

        let groups = group_matches(matches, CategoryFilter::All, GroupLimits::default(), |_| {
            None
        });
        assert_eq!(groups.len(), 10);
        assert_eq!(groups[0].url, "https://0.example");
        assert_eq!(groups[9].url, "https://9.example");
    }

    #[test]
    fn test_group_match_cap_applies_before_grouping() {
        let mut matches: Vec<ChunkMatch> = (0..50)
            .map(|i| chunk_match("https://a.example", i, 0.9))
            .collect();
        matches.push(chunk_match("https://late.example", 0, 0.5));

        let groups = group_matches(matches, CategoryFilter::All, GroupLimits::default(), |_| {
            None
        });
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].matches.len(), 50);
    }

    #[test]
    fn test_group_category_filter_removes_best_group() {
        let matches = vec![
            chunk_match("https://news.example", 0, 0.99),
            chunk_match("https://shop.example", 0, 0.5),
            chunk_match("https://news.example", 1, 0.45),
            chunk_match("https://unknown.example", 0, 0.4),
        ];

        let groups = group_matches(
            matches,
            CategoryFilter::Only(Category::Ecommerce),
            GroupLimits::default(),
            |m| match m.url.as_str() {
                "https://news.example" => Some(DocumentInfo {
                    category: Some(Category::News),
                    ..Default::default()
                }),
                "https://shop.example" => Some(DocumentInfo {
                    title: Some("Shop".to_string()),
                    category: Some(Category::Ecommerce),
                    favicon: None,
                }),
                _ => None,
            },
        );

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].url, "https://shop.example");
        assert_eq!(groups[0].title.as_deref(), Some("Shop"));
    }

    #[test]
    fn test_group_lookup_called_once_per_url() {
        let matches = vec![
            chunk_match("https://a.example", 0, 0.9),
            chunk_match("https://a.example", 1, 0.8),
            chunk_match("https://a.example", 2, 0.7),
        ];

        let mut calls = 0;
        let groups = group_matches(matches, CategoryFilter::All, GroupLimits::default(), |_| {
            calls += 1;
            None
        });

        assert_eq!(calls, 1);
        assert_eq!(groups[0].matches.len(), 3);
    }
}
