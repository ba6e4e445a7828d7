//! Capture and query flows over the remote index with local fallback.
//!
//! Every remote stage yields either a remote value or the reason it fell
//! back to local components; callers see the source in [`Served`].

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    config::{CaptureConfig, SearchConfig},
    pages::{self, CapturedPage, Category, CategoryFilter, ChunkRecord, DocumentMeta, EmbeddingMethod},
    semantic::{
        self,
        index::{ChunkMatch, DocumentInfo, SearchResult},
        LocalEmbedder,
    },
};

use super::{
    backend::{ChunkMetadata, Health, Product, ProductChunk, RemoteBackend, SearchHit, Stats},
    errors::{AppError, TransportError},
    local::LocalStore,
    url_index::UrlIndex,
};

/// Why a stage ran locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Remote backend disabled by configuration
    LocalMode,
    /// Blank query, answered without contacting the backend
    EmptyQuery,
    Unreachable(String),
    Status(u16),
    Malformed(String),
}

impl From<TransportError> for FallbackReason {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Request(err) => FallbackReason::Unreachable(err.to_string()),
            TransportError::Status { status, .. } => FallbackReason::Status(status),
            TransportError::Remote(msg) | TransportError::Decode(msg) => FallbackReason::Malformed(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Remote,
    Local(FallbackReason),
}

impl Source {
    #[cfg(test)]
    pub fn is_remote(&self) -> bool {
        matches!(self, Source::Remote)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::Remote => "remote",
            Source::Local(_) => "local",
        }
    }
}

/// A value and the component that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Served<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Served<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            source: Source::Remote,
        }
    }

    fn local(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            source: Source::Local(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureReport {
    /// URL matched the exclusion list
    Excluded { url: String },
    /// No text to index
    Empty { url: String },
    Stored {
        url: String,
        category: Category,
        chunks: usize,
        embedded: Source,
        stored: Source,
    },
}

pub struct Orchestrator {
    remote: Option<Box<dyn RemoteBackend>>,
    local: LocalStore,
    url_index: UrlIndex,
    embedder: LocalEmbedder,
    capture: CaptureConfig,
    search: SearchConfig,
}

impl Orchestrator {
    /// `remote` is `None` in local mode; the backend is then never contacted.
    pub fn new(
        remote: Option<Box<dyn RemoteBackend>>,
        local: LocalStore,
        url_index: UrlIndex,
        capture: CaptureConfig,
        search: SearchConfig,
    ) -> Self {
        Self {
            remote,
            local,
            url_index,
            embedder: LocalEmbedder::default(),
            capture,
            search,
        }
    }

    #[cfg(test)]
    pub fn is_local_only(&self) -> bool {
        self.remote.is_none()
    }

    fn remote(&self) -> Result<&dyn RemoteBackend, FallbackReason> {
        self.remote.as_deref().ok_or(FallbackReason::LocalMode)
    }

    fn degraded(stage: &str, reason: &FallbackReason) {
        match reason {
            FallbackReason::LocalMode | FallbackReason::EmptyQuery => {
                log::debug!("{stage}: answered locally ({reason:?})")
            }
            reason => log::warn!("{stage}: remote unavailable ({reason:?}), degraded mode"),
        }
    }

    /// Chunk, embed and store a captured page.
    pub async fn capture(&self, page: CapturedPage) -> Result<CaptureReport, AppError> {
        let url = page.url.trim().to_string();
        if url.is_empty() {
            return Err(AppError::InvalidInput("url is empty".to_string()));
        }

        if pages::is_excluded(&url, &self.capture.excluded_domains) {
            log::info!("skipping excluded host {}", pages::host_of(&url));
            return Ok(CaptureReport::Excluded { url });
        }

        let chunks = semantic::chunk(&page.content, self.capture.chunk_size);
        if chunks.is_empty() {
            log::info!("nothing to capture at {url}");
            return Ok(CaptureReport::Empty { url });
        }

        let category = pages::categorize(&url, &page.content);
        let meta = DocumentMeta {
            url: url.clone(),
            title: Some(page.title.clone()).filter(|t| !t.is_empty()),
            category: Some(category),
            favicon: page.favicon.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            chunk_count: chunks.len(),
        };
        log::info!("capturing {url} [{category}], {} chunks", chunks.len());

        let embedded = self.embed_chunks(&chunks).await;

        let stored = match embedded.source {
            Source::Remote => match self.remote_add(&meta, &chunks, &embedded.value).await {
                Ok(()) => Source::Remote,
                Err(reason) => {
                    Self::degraded("add", &reason);
                    // remote vectors are not comparable with local query vectors
                    let vectors = self.embedder.embed_batch(&chunks);
                    self.store_local(&meta, &chunks, vectors, EmbeddingMethod::Local)?;
                    Source::Local(reason)
                }
            },
            Source::Local(ref reason) => {
                self.store_local(&meta, &chunks, embedded.value, EmbeddingMethod::Local)?;
                Source::Local(reason.clone())
            }
        };

        self.url_index.record(&url, category)?;
        log::info!("captured {url} [{category}]");

        Ok(CaptureReport::Stored {
            url,
            category,
            chunks: chunks.len(),
            embedded: embedded.source,
            stored,
        })
    }

    /// Embed all chunks remotely in one batch, locally on failure.
    async fn embed_chunks(&self, chunks: &[String]) -> Served<Vec<Vec<f32>>> {
        match self.remote_embed(chunks).await {
            Ok(vectors) => Served::remote(vectors),
            Err(reason) => {
                Self::degraded("embed", &reason);
                Served::local(self.embedder.embed_batch(chunks), reason)
            }
        }
    }

    async fn remote_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, FallbackReason> {
        let vectors = self.remote()?.embed(texts).await?;

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if vectors.len() != texts.len() || dimension == 0 || vectors.iter().any(|v| v.len() != dimension) {
            return Err(FallbackReason::Malformed(format!(
                "{} vectors for {} texts with inconsistent dimensions",
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }

    async fn remote_add(
        &self,
        meta: &DocumentMeta,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<(), FallbackReason> {
        let remote = self.remote()?;

        let metadata: Vec<ChunkMetadata> = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| ChunkMetadata {
                url: meta.url.clone(),
                chunk: chunk.clone(),
                chunk_index: i,
                title: meta.title.clone(),
                category: meta.category,
                favicon: meta.favicon.clone(),
                timestamp: meta.timestamp,
            })
            .collect();

        let added = remote.add(vectors, &metadata).await?;
        log::info!(
            "remote indexed {} chunks, {} vectors total",
            added.added,
            added.total_vectors
        );
        Ok(())
    }

    fn store_local(
        &self,
        meta: &DocumentMeta,
        chunks: &[String],
        vectors: Vec<Vec<f32>>,
        method: EmbeddingMethod,
    ) -> Result<(), AppError> {
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, embedding))| ChunkRecord {
                text: text.clone(),
                embedding,
                url: meta.url.clone(),
                chunk_index: i,
                method,
            })
            .collect();

        self.local.put_document(meta, &records)?;
        log::debug!("stored {} chunks locally for {}", records.len(), meta.url);
        Ok(())
    }

    /// Ranked documents for `query`, remote first.
    pub async fn search(
        &self,
        query: &str,
        filter: CategoryFilter,
    ) -> Result<Served<Vec<SearchResult>>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Served::local(Vec::new(), FallbackReason::EmptyQuery));
        }

        match self.remote_search(query, filter).await {
            Ok(results) => {
                log::info!("remote search returned {} documents", results.len());
                Ok(Served::remote(results))
            }
            Err(reason) => {
                Self::degraded("search", &reason);
                let results = self.search_local(query, filter);
                log::info!("local search returned {} documents", results.len());
                Ok(Served::local(results, reason))
            }
        }
    }

    async fn remote_search(
        &self,
        query: &str,
        filter: CategoryFilter,
    ) -> Result<Vec<SearchResult>, FallbackReason> {
        let hits = self
            .remote()?
            .search(query, self.search.remote_k, filter.category())
            .await?;

        Ok(group_remote_hits(hits, filter, &self.search))
    }

    fn search_local(&self, query: &str, filter: CategoryFilter) -> Vec<SearchResult> {
        let query_vector = self.embedder.embed(query);
        self.local.search(
            &query_vector,
            EmbeddingMethod::Local,
            self.search.threshold,
            filter,
            self.search.limits(),
        )
    }

    /// Product comparison across shop pages.
    pub async fn compare(&self, query: &str) -> Result<Served<Vec<Product>>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Served::local(Vec::new(), FallbackReason::EmptyQuery));
        }

        let remote = match self.remote() {
            Ok(remote) => remote.compare(query).await.map_err(FallbackReason::from),
            Err(reason) => Err(reason),
        };

        match remote {
            Ok(products) => Ok(Served::remote(products)),
            Err(reason) => {
                Self::degraded("compare", &reason);
                let searched = self
                    .search(query, CategoryFilter::Only(Category::Ecommerce))
                    .await?;
                let products = products_from_results(searched.value, self.search.max_groups);

                // report the compare fallback, the search itself may still have been remote
                Ok(Served::local(products, reason))
            }
        }
    }

    pub async fn stats(&self) -> Result<Served<Stats>, AppError> {
        let remote = match self.remote() {
            Ok(remote) => remote.stats().await.map_err(FallbackReason::from),
            Err(reason) => Err(reason),
        };

        match remote {
            Ok(stats) => Ok(Served::remote(stats)),
            Err(reason) => {
                Self::degraded("stats", &reason);
                Ok(Served::local(self.url_index.stats()?, reason))
            }
        }
    }

    /// Backend availability. Never fails.
    pub async fn health(&self) -> Served<Health> {
        let remote = match self.remote() {
            Ok(remote) => remote.health().await.map_err(FallbackReason::from),
            Err(reason) => Err(reason),
        };

        match remote {
            Ok(health) => Served::remote(health),
            Err(reason) => {
                let error = match &reason {
                    FallbackReason::LocalMode | FallbackReason::EmptyQuery => {
                        "remote backend disabled".to_string()
                    }
                    FallbackReason::Unreachable(msg) | FallbackReason::Malformed(msg) => msg.clone(),
                    FallbackReason::Status(status) => format!("remote returned {status}"),
                };
                log::debug!("backend offline: {error}");
                Served::local(Health::offline(error), reason)
            }
        }
    }
}

/// Group remote hits by document using the metadata carried on each hit.
fn group_remote_hits(hits: Vec<SearchHit>, filter: CategoryFilter, config: &SearchConfig) -> Vec<SearchResult> {
    let mut infos: HashMap<String, DocumentInfo> = HashMap::new();
    let mut matches = Vec::with_capacity(hits.len());

    for hit in hits {
        let meta = hit.metadata;
        infos.entry(meta.url.clone()).or_insert_with(|| DocumentInfo {
            title: meta.title,
            category: meta.category,
            favicon: meta.favicon,
        });
        matches.push(ChunkMatch {
            url: meta.url,
            text: meta.chunk,
            chunk_index: meta.chunk_index,
            similarity: hit.similarity,
        });
    }

    semantic::group_matches(matches, filter, config.limits(), |chunk_match| {
        infos.get(&chunk_match.url).cloned()
    })
}

/// One product per document, ranked by mean match similarity.
fn products_from_results(results: Vec<SearchResult>, max: usize) -> Vec<Product> {
    let mut products: Vec<Product> = results
        .into_iter()
        .filter(|result| !result.matches.is_empty())
        .map(|result| {
            let avg_similarity = result.matches.iter().map(|m| m.similarity).sum::<f32>()
                / result.matches.len() as f32;

            Product {
                url: result.url,
                title: result.title,
                favicon: result.favicon,
                chunks: result
                    .matches
                    .into_iter()
                    .map(|m| ProductChunk {
                        text: m.text,
                        similarity: m.similarity,
                    })
                    .collect(),
                avg_similarity,
            }
        })
        .collect();

    products.sort_by(|a, b| b.avg_similarity.total_cmp(&a.avg_similarity));
    products.truncate(max);
    products
}
