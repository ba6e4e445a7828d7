use std::sync::Arc;

use crate::{
    pages::{self, CategoryFilter, ChunkRecord, DocumentMeta, EmbeddingMethod, CHUNK_KEY_PREFIX},
    semantic::index::{self, DocumentInfo, GroupLimits, SearchResult},
    storage::{self, StorageManager, StoreError},
};

/// Document and chunk records kept in the local key-value store.
///
/// Used when the remote index is unreachable: captures land here and
/// queries scan every stored chunk.
#[derive(Clone)]
pub struct LocalStore {
    store: Arc<dyn StorageManager>,
}

impl LocalStore {
    pub fn new(store: Arc<dyn StorageManager>) -> Self {
        Self { store }
    }

    /// Write a document's metadata and chunks, replacing an earlier capture
    /// of the same URL.
    ///
    /// Keys are derived from the URL hash; records of another URL with the
    /// same hash are never removed, only overwritten where the keys coincide.
    pub fn put_document(&self, meta: &DocumentMeta, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        let store = self.store.as_ref();

        let meta_key = pages::meta_key(&meta.url);
        if let Some(previous) = storage::read_json::<DocumentMeta>(store, &meta_key)? {
            if previous.url != meta.url {
                log::warn!("url hash collision: {} replaces {}", meta.url, previous.url);
            }
        }

        storage::write_json(store, &meta_key, meta)?;
        for chunk in chunks {
            storage::write_json(store, &pages::chunk_key(&meta.url, chunk.chunk_index), chunk)?;
        }

        // chunks left over from a longer previous capture
        let prefix = pages::chunk_key_prefix(&meta.url);
        for key in store.list() {
            if !key.starts_with(&prefix) {
                continue;
            }
            let Some((_, index)) = pages::parse_chunk_key(&key) else {
                continue;
            };
            if index < chunks.len() {
                continue;
            }

            match storage::read_json::<ChunkRecord>(store, &key) {
                Ok(Some(record)) if record.url != meta.url => {}
                _ => {
                    log::debug!("removing stale chunk {key}");
                    storage::delete_key(store, &key)?;
                }
            }
        }

        Ok(())
    }

    /// Metadata stored for `url`. `None` when absent or when the key holds
    /// another URL with the same hash.
    pub fn document(&self, url: &str) -> Result<Option<DocumentMeta>, StoreError> {
        let meta: Option<DocumentMeta> = storage::read_json(self.store.as_ref(), &pages::meta_key(url))?;
        Ok(meta.filter(|meta| meta.url == url))
    }

    /// Every readable chunk record, ordered by key (URL hash, then index).
    ///
    /// Unreadable records are skipped with a warning.
    pub fn chunks(&self) -> Vec<ChunkRecord> {
        let mut keys: Vec<(String, usize, String)> = self
            .store
            .list()
            .into_iter()
            .filter(|key| key.starts_with(CHUNK_KEY_PREFIX))
            .filter_map(|key| {
                let (hash, index) = pages::parse_chunk_key(&key)?;
                Some((hash.to_string(), index, key))
            })
            .collect();
        keys.sort();

        keys.into_iter()
            .filter_map(|(_, _, key)| {
                match storage::read_json::<ChunkRecord>(self.store.as_ref(), &key) {
                    Ok(record) => record,
                    Err(err) => {
                        log::warn!("skipping unreadable chunk: {err}");
                        None
                    }
                }
            })
            .collect()
    }

    /// Full scan of local chunks against a query vector, grouped by document.
    pub fn search(
        &self,
        query: &[f32],
        method: EmbeddingMethod,
        threshold: f32,
        filter: CategoryFilter,
        limits: GroupLimits,
    ) -> Vec<SearchResult> {
        let corpus = self.chunks();
        let matches = index::rank(query, method, &corpus, Some(threshold));
        log::debug!(
            "local scan: {} of {} chunks above {threshold}",
            matches.len(),
            corpus.len()
        );

        index::group_matches(matches, filter, limits, |chunk_match| {
            match self.document(&chunk_match.url) {
                Ok(meta) => meta.map(|meta| DocumentInfo {
                    title: meta.title,
                    category: meta.category,
                    favicon: meta.favicon,
                }),
                Err(err) => {
                    log::warn!("metadata lookup failed for {}: {err}", chunk_match.url);
                    None
                }
            }
        })
    }
}
