use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pages::Category;

use super::errors::TransportError;

/// Remote embedding and vector index service.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Embed `texts` in one batch, one vector per text in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TransportError>;

    async fn add(
        &self,
        embeddings: &[Vec<f32>],
        metadata: &[ChunkMetadata],
    ) -> Result<AddResponse, TransportError>;

    /// Nearest chunks to `query`; `None` searches every category.
    async fn search(
        &self,
        query: &str,
        k: usize,
        category: Option<Category>,
    ) -> Result<Vec<SearchHit>, TransportError>;

    async fn compare(&self, query: &str) -> Result<Vec<Product>, TransportError>;

    async fn stats(&self) -> Result<Stats, TransportError>;

    async fn health(&self) -> Result<Health, TransportError>;
}

#[derive(Debug, Serialize)]
pub struct EmbedRequest<'a> {
    pub texts: &'a [String],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedResponse {
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub dimension: usize,
}

/// Per-chunk metadata stored next to each remote vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    #[serde(default)]
    pub url: String,
    /// Chunk text
    #[serde(default)]
    pub chunk: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct AddRequest<'a> {
    pub embeddings: &'a [Vec<f32>],
    pub metadata: &'a [ChunkMetadata],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddResponse {
    #[serde(default)]
    pub added: usize,
    #[serde(default)]
    pub total_vectors: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub k: usize,
    /// Serialized as `null` for all categories
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub metadata: ChunkMetadata,
    #[serde(default)]
    pub similarity: f32,
}

#[derive(Debug, Serialize)]
pub struct CompareRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompareResponse {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductChunk {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub similarity: f32,
}

/// One shop page in a product comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub chunks: Vec<ProductChunk>,
    #[serde(default)]
    pub avg_similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total_urls: usize,
    #[serde(default)]
    pub categories: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Anything else the service reports (model, vector count, ...)
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl Health {
    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            status: "offline".to_string(),
            error: Some(error.into()),
            details: Default::default(),
        }
    }
}
