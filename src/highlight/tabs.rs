//! Open pages the daemon can highlight.
//!
//! A tab can be referenced before its HTML arrives: a highlight scheduled
//! for it waits on the tab's load state until the page is opened.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use super::schedule::{cancel_pair, CancelHandle, CancelToken, HighlightTarget};
use super::{apply_highlight, HtmlPage, MatchPolicy, RegionError, Selection};

/// One open page.
#[derive(Debug)]
pub struct Tab {
    loaded: watch::Sender<bool>,
    page: Mutex<Option<HtmlPage>>,
    closed: CancelHandle,
    close_token: CancelToken,
}

impl Tab {
    fn new() -> Self {
        let (loaded, _) = watch::channel(false);
        let (closed, close_token) = cancel_pair();
        Self {
            loaded,
            page: Mutex::new(None),
            closed,
            close_token,
        }
    }

    /// Cancelled when the tab is closed.
    pub fn close_token(&self) -> CancelToken {
        self.close_token.clone()
    }

    fn page(&self) -> MutexGuard<'_, Option<HtmlPage>> {
        // a poisoned lock only means a panic mid-highlight; the page data is still usable
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the tab's content and mark it loaded.
    pub fn open(&self, html: &str) {
        *self.page() = Some(HtmlPage::parse(html));
        self.loaded.send_replace(true);
    }

    pub fn region_count(&self) -> usize {
        self.page().as_ref().map(HtmlPage::len).unwrap_or(0)
    }

    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Texts currently marked on the page, empty if not loaded.
    pub fn marked_texts(&self) -> Vec<String> {
        self.page()
            .as_ref()
            .map(|page| page.marked_texts().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HighlightTarget for Tab {
    fn load_state(&self) -> watch::Receiver<bool> {
        self.loaded.subscribe()
    }

    async fn ping(&self) -> bool {
        self.page().is_some()
    }

    async fn highlight(&self, text: &str, policy: &MatchPolicy) -> Result<Selection, RegionError> {
        match self.page().as_mut() {
            Some(page) => apply_highlight(page, text, policy),
            None => Ok(Selection::default()),
        }
    }
}

/// Tabs keyed by caller-chosen id.
#[derive(Debug, Default)]
pub struct Tabs {
    tabs: Mutex<HashMap<String, Arc<Tab>>>,
}

impl Tabs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Tab>>> {
        self.tabs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the tab for `id`, creating an unloaded one if needed.
    pub fn get_or_create(&self, id: &str) -> Arc<Tab> {
        self.lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Tab::new()))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Tab>> {
        self.lock().get(id).cloned()
    }

    /// Open `html` in tab `id`, waking any highlight waiting for it.
    pub fn open(&self, id: &str, html: &str) -> Arc<Tab> {
        let tab = self.get_or_create(id);
        tab.open(html);
        log::debug!("opened tab {id}");
        tab
    }

    /// Tab `id` held for one highlight request. A tab created for the request
    /// is dropped again if it was never opened.
    pub fn pending(&self, id: &str) -> PendingTab<'_> {
        PendingTab {
            tabs: self,
            id: id.to_string(),
            tab: self.get_or_create(id),
        }
    }

    /// Remove tab `id` if it was never opened and `held` is the only handle
    /// to it outside the registry.
    pub fn discard_if_unopened(&self, id: &str, held: &Arc<Tab>) -> bool {
        let mut tabs = self.lock();
        let unused = tabs.get(id).is_some_and(|tab| {
            Arc::ptr_eq(tab, held) && !tab.is_loaded() && Arc::strong_count(tab) == 2
        });
        if unused {
            tabs.remove(id);
            log::debug!("discarded unopened tab {id}");
        }
        unused
    }

    /// Drop tab `id`, abandoning highlights still pending on it.
    pub fn close(&self, id: &str) -> bool {
        match self.lock().remove(id) {
            Some(tab) => {
                tab.closed.cancel();
                log::debug!("closed tab {id}");
                true
            }
            None => false,
        }
    }
}

/// See [`Tabs::pending`].
pub struct PendingTab<'a> {
    tabs: &'a Tabs,
    id: String,
    tab: Arc<Tab>,
}

impl PendingTab<'_> {
    pub fn tab(&self) -> &Tab {
        &self.tab
    }
}

impl Drop for PendingTab<'_> {
    fn drop(&mut self) {
        self.tabs.discard_if_unopened(&self.id, &self.tab);
    }
}
