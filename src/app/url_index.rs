use std::{collections::BTreeMap, sync::Arc};

use crate::{
    pages::{Category, CATEGORY_INDEX_KEY, URL_INDEX_KEY},
    storage::{self, StorageManager, StoreError},
};

use super::backend::Stats;

/// Captured URLs and their categories, kept for statistics.
///
/// Updated after each capture regardless of where the vectors went.
#[derive(Clone)]
pub struct UrlIndex {
    store: Arc<dyn StorageManager>,
}

impl UrlIndex {
    pub fn new(store: Arc<dyn StorageManager>) -> Self {
        Self { store }
    }

    pub fn urls(&self) -> Result<Vec<String>, StoreError> {
        Ok(storage::read_json(self.store.as_ref(), URL_INDEX_KEY)?.unwrap_or_default())
    }

    pub fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        Ok(storage::read_json(self.store.as_ref(), CATEGORY_INDEX_KEY)?.unwrap_or_default())
    }

    /// Add `url` under `category`, moving it out of any other category.
    pub fn record(&self, url: &str, category: Category) -> Result<(), StoreError> {
        let store = self.store.as_ref();

        let mut urls = self.urls()?;
        if !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
            storage::write_json(store, URL_INDEX_KEY, &urls)?;
        }

        let mut categories = self.categories()?;
        for (name, members) in categories.iter_mut() {
            if name != category.as_str() {
                members.retain(|u| u != url);
            }
        }
        categories.retain(|_, members| !members.is_empty());

        let members = categories.entry(category.as_str().to_string()).or_default();
        if !members.iter().any(|u| u == url) {
            members.push(url.to_string());
        }
        storage::write_json(store, CATEGORY_INDEX_KEY, &categories)
    }

    pub fn stats(&self) -> Result<Stats, StoreError> {
        Ok(Stats {
            total_urls: self.urls()?.len(),
            categories: self
                .categories()?
                .into_iter()
                .map(|(name, members)| (name, members.len()))
                .collect(),
        })
    }
}
