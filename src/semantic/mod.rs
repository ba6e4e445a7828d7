//! Retrieval core: chunking, fallback embeddings, similarity ranking.
//!
//! # Architecture
//!
//! - `chunk`: sentence-aligned chunking of page text
//! - `embeddings`: hash-based local embedder used in degraded mode
//! - `index`: cosine similarity ranking and grouping by document
//! - `preprocess`: HTML text extraction for capture

pub mod chunk;
pub mod embeddings;
pub mod index;
pub mod preprocess;

pub use chunk::{chunk, DEFAULT_CHUNK_SIZE};
pub use embeddings::LocalEmbedder;
pub use index::group_matches;
pub use preprocess::{extract_page, normalize_text, MAX_CONTENT_LENGTH};

/// Minimum similarity for local-mode matches (strictly greater than)
pub const DEFAULT_THRESHOLD: f32 = 0.3;
