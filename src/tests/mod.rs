mod web;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use crate::{
    app::{
        backend::{AddResponse, ChunkMetadata, Health, Product, RemoteBackend, SearchHit, Stats},
        local::LocalStore,
        errors::TransportError,
        url_index::UrlIndex,
        Orchestrator,
    },
    config::{CaptureConfig, SearchConfig},
    pages::Category,
    storage::{BackendMemory, StorageManager},
};

/// In-memory stand-in for the remote index service.
#[derive(Default)]
pub struct FakeBackend {
    /// Every call fails with 503
    pub offline: bool,
    /// `add` fails with 500
    pub reject_add: bool,
    pub calls: AtomicUsize,
    pub added: Mutex<Vec<ChunkMetadata>>,
}

impl FakeBackend {
    pub fn online() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            offline: true,
            ..Default::default()
        })
    }

    pub fn rejecting_add() -> Arc<Self> {
        Arc::new(Self {
            reject_add: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(TransportError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for Arc<FakeBackend> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TransportError> {
        self.call()?;
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }

    async fn add(
        &self,
        embeddings: &[Vec<f32>],
        metadata: &[ChunkMetadata],
    ) -> Result<AddResponse, TransportError> {
        self.call()?;
        if self.reject_add {
            return Err(TransportError::Status {
                status: 500,
                body: "index full".to_string(),
            });
        }

        let mut added = self.added.lock().unwrap();
        added.extend_from_slice(metadata);
        Ok(AddResponse {
            added: embeddings.len(),
            total_vectors: added.len(),
        })
    }

    async fn search(
        &self,
        _query: &str,
        k: usize,
        category: Option<Category>,
    ) -> Result<Vec<SearchHit>, TransportError> {
        self.call()?;
        Ok(self
            .added
            .lock()
            .unwrap()
            .iter()
            .filter(|meta| category.is_none() || meta.category == category)
            .take(k)
            .map(|meta| SearchHit {
                metadata: meta.clone(),
                similarity: 0.1,
            })
            .collect())
    }

    async fn compare(&self, _query: &str) -> Result<Vec<Product>, TransportError> {
        self.call()?;
        Ok(vec![Product {
            url: "https://shop.example.com/product/1".to_string(),
            avg_similarity: 0.8,
            ..Default::default()
        }])
    }

    async fn stats(&self) -> Result<Stats, TransportError> {
        self.call()?;
        Ok(Stats {
            total_urls: 42,
            categories: Default::default(),
        })
    }

    async fn health(&self) -> Result<Health, TransportError> {
        self.call()?;
        Ok(Health {
            status: "ok".to_string(),
            ..Default::default()
        })
    }
}

/// Orchestrator over an in-memory store. `None` runs in local mode.
pub fn create_orchestrator(
    remote: Option<Arc<FakeBackend>>,
    capture: CaptureConfig,
) -> (Orchestrator, Arc<dyn StorageManager>) {
    let store: Arc<dyn StorageManager> = Arc::new(BackendMemory::new());
    let remote = remote.map(|backend| Box::new(backend) as Box<dyn RemoteBackend>);

    let orchestrator = Orchestrator::new(
        remote,
        LocalStore::new(store.clone()),
        UrlIndex::new(store.clone()),
        capture,
        SearchConfig::default(),
    );
    (orchestrator, store)
}
